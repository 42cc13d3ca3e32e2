use anyhow::Result;
use pipewright::{error_category, App, Args, Outcome, Settings};
use std::path::Path;
use tempfile::{tempdir, TempDir};
use util::ErrorCategory;

const CONFIG_DIR: &str = "tests/fixtures/config";
const SEED: u64 = 7;

fn path_str(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_str().unwrap().to_owned()
}

fn basic_args(dir: &TempDir, pipeline: &str, pipeline_args: &[&str]) -> Args {
    Args {
        pipeline: pipeline.to_owned(),
        pipeline_args: pipeline_args.iter().map(|a| a.to_string()).collect(),
        config_dir: CONFIG_DIR.to_owned(),
        output_path: Some(path_str(dir, "out")),
        makefile: Some(path_str(dir, &format!("{pipeline}.make"))),
        jobs: 1,
        seed: Some(SEED),
        verbose: 1,
        ..Default::default()
    }
}

fn touch(dir: &TempDir, names: &[&str]) -> Result<()> {
    for name in names {
        std::fs::write(dir.path().join(name), "")?;
    }
    Ok(())
}

fn run(args: Args) -> Result<Outcome> {
    simple_logging::log_to_stderr(log::LevelFilter::Debug);
    let settings: Settings = args.try_into()?;
    App::new(settings).run()
}

fn read(path: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(path)?)
}

#[test]
fn test_linear_pipeline() -> Result<()> {
    let dir = tempdir()?;
    touch(&dir, &["s.fq", "hg.fa"])?;
    let (fq, fa, out) = (path_str(&dir, "s.fq"), path_str(&dir, "hg.fa"), path_str(&dir, "out"));

    let outcome = run(basic_args(&dir, "variants", &["--fastq", &fq, "-r", &fa]))?;
    assert_eq!(outcome.num_tasks, 3);
    assert_eq!(outcome.num_phases, 1);
    assert_eq!(outcome.inputs, vec![fa.clone(), fq.clone()]);
    assert!(Path::new(&out).is_dir(), "output directory is created");

    let text = read(&outcome.makefile)?;
    assert!(text.starts_with("# Makefile for pipeline \"variants\""));
    assert!(text.contains(".DELETE_ON_ERROR:"));
    assert!(text.contains("### PHASE 1: 1 subphase(s), 1 division(s)"));
    let all = text.lines().find(|l| l.starts_with("all: ")).expect("all target");
    assert!(all.ends_with(&format!(" {out}/s_sorted_chr1.vcf")));
    assert!(text.contains(&format!("{out}/s_sorted.bam: {out}/s_")));
    assert!(text.contains(&format!("aligner-2.1/aligner --reference {fa} --fastq {fq} --out {out}/s_")));
    assert!(text.contains("--threads 2"));
    assert!(text.contains("--region chr1"));

    // the aligned file is marked for deletion and gets random text in its name
    let intermediate = text
        .lines()
        .find_map(|l| l.strip_prefix(".INTERMEDIATE: "))
        .expect("intermediate files are listed");
    let files: Vec<&str> = intermediate.split(' ').collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with(&format!("{out}/s_")));
    assert!(files[0].ends_with(".bam"));
    assert_ne!(files[0], format!("{out}/s_sorted.bam"));
    Ok(())
}

#[test]
fn test_seed_gives_same_makefile() -> Result<()> {
    let dir = tempdir()?;
    touch(&dir, &["s.fq", "hg.fa"])?;
    let (fq, fa) = (path_str(&dir, "s.fq"), path_str(&dir, "hg.fa"));

    let first = read(&run(basic_args(&dir, "variants", &["--fastq", &fq, "-r", &fa]))?.makefile)?;
    let second = read(&run(basic_args(&dir, "variants", &["--fastq", &fq, "-r", &fa]))?.makefile)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_list_file_and_greedy_merge() -> Result<()> {
    let dir = tempdir()?;
    touch(&dir, &["a.fq", "b.fq", "hg.fa"])?;
    let (a, b, fa, out) = (
        path_str(&dir, "a.fq"),
        path_str(&dir, "b.fq"),
        path_str(&dir, "hg.fa"),
        path_str(&dir, "out"),
    );
    let list = path_str(&dir, "samples.list");
    std::fs::write(&list, format!("{a}\n{b}\n"))?;

    let outcome = run(basic_args(&dir, "cohort", &["--fastq", &list, "--reference", &fa]))?;
    assert_eq!(outcome.num_phases, 2);
    assert_eq!(outcome.inputs, vec![a.clone(), b.clone(), fa.clone()]);

    let text = read(&outcome.makefile)?;
    assert!(text.contains("### PHASE 1: 2 subphase(s), 1 division(s)"));
    assert!(text.contains("### PHASE 2: 1 subphase(s), 1 division(s)"));
    assert!(text.contains(&format!("{out}/a_sorted_chr1.vcf:")));
    assert!(text.contains(&format!("{out}/b_sorted_chr1.vcf:")));
    assert!(text.contains(&format!(
        "{out}/merged.vcf: {out}/a_sorted_chr1.vcf {out}/b_sorted_chr1.vcf"
    )));
    assert!(text.contains(&format!(
        "merger --in {out}/a_sorted_chr1.vcf --in {out}/b_sorted_chr1.vcf --out {out}/merged.vcf"
    )));
    Ok(())
}

#[test]
fn test_stream_joins_rules() -> Result<()> {
    let dir = tempdir()?;
    touch(&dir, &["s.fq", "hg.fa"])?;
    let (fq, fa, out) = (path_str(&dir, "s.fq"), path_str(&dir, "hg.fa"), path_str(&dir, "out"));

    let outcome = run(basic_args(&dir, "streamed", &["--fastq", &fq, "--reference", &fa]))?;
    let text = read(&outcome.makefile)?;
    assert!(text.contains("# align | sort"));
    assert!(text.contains(&format!(
        "aligner-2.1/aligner --reference {fa} --fastq {fq} --threads 2 | sorter --in - --out {out}/s_sorted.bam"
    )));
    assert!(!text.contains(&format!("{out}/s.bam")), "piped file never touches disk");
    Ok(())
}

#[test]
fn test_missing_required_argument() -> Result<()> {
    let dir = tempdir()?;
    touch(&dir, &["s.fq"])?;
    let fq = path_str(&dir, "s.fq");

    let err = run(basic_args(&dir, "variants", &["--fastq", &fq])).unwrap_err();
    assert_eq!(error_category(&err), Some(ErrorCategory::Argument));
    assert_eq!(pipewright::report(&err), 9);
    Ok(())
}

#[test]
fn test_wrong_extension() -> Result<()> {
    let dir = tempdir()?;
    touch(&dir, &["s.txt", "hg.fa"])?;
    let (txt, fa) = (path_str(&dir, "s.txt"), path_str(&dir, "hg.fa"));

    let err = run(basic_args(&dir, "variants", &["--fastq", &txt, "-r", &fa])).unwrap_err();
    assert_eq!(error_category(&err), Some(ErrorCategory::DataConsistency));
    Ok(())
}

#[test]
fn test_missing_input_files() -> Result<()> {
    let dir = tempdir()?;
    let (fq, fa) = (path_str(&dir, "s.fq"), path_str(&dir, "hg.fa"));

    let err = run(basic_args(&dir, "variants", &["--fastq", &fq, "-r", &fa])).unwrap_err();
    assert_eq!(error_category(&err), Some(ErrorCategory::Argument));
    assert!(err.to_string().contains("input files") || format!("{err:#}").contains("s.fq"));

    let mut args = basic_args(&dir, "variants", &["--fastq", &fq, "-r", &fa]);
    args.no_input_check = true;
    let outcome = run(args)?;
    assert!(outcome.makefile.exists());
    Ok(())
}

#[test]
fn test_unknown_pipeline_argument() -> Result<()> {
    let dir = tempdir()?;
    let err = run(basic_args(&dir, "variants", &["--nonsense", "1"])).unwrap_err();
    assert_eq!(error_category(&err), Some(ErrorCategory::Argument));
    Ok(())
}

#[test]
fn test_exports() -> Result<()> {
    let dir = tempdir()?;
    touch(&dir, &["s.fq", "hg.fa"])?;
    let (fq, fa) = (path_str(&dir, "s.fq"), path_str(&dir, "hg.fa"));

    let mut args = basic_args(&dir, "variants", &["--fastq", &fq, "-r", &fa]);
    args.export_parameter_set = Some("saved".to_owned());
    args.dot = Some(path_str(&dir, "variants.dot"));
    run(args)?;

    let saved: serde_json::Value = serde_json::from_str(&read(&dir.path().join("out/saved.json"))?)?;
    assert_eq!(saved["id"], "saved");
    let data = saved["data"].as_array().expect("data is a list");
    let fastq = data
        .iter()
        .find(|d| d["argument"] == "--fastq")
        .expect("--fastq is saved");
    assert_eq!(fastq["values"], serde_json::json!([fq]));

    let dot = read(&dir.path().join("variants.dot"))?;
    assert!(dot.starts_with("digraph pipeline {"));
    assert!(dot.contains("shape=box, label=\"align\""));
    assert!(dot.trim_end().ends_with('}'));
    Ok(())
}

#[test]
fn test_bad_settings() -> Result<()> {
    let dir = tempdir()?;
    let mut args = basic_args(&dir, "variants", &[]);
    args.config_dir = path_str(&dir, "nowhere");
    let err = run(args).unwrap_err();
    assert_eq!(error_category(&err), Some(ErrorCategory::CommandLine));

    let err = run(basic_args(&dir, "variants", &["stray"])).unwrap_err();
    assert_eq!(error_category(&err).map(ErrorCategory::exit_code), Some(3));
    Ok(())
}
