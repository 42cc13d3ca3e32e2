use std::path::Path;

use config::{DataType, StreamHandling, ToolArgument, ToolConfig};
use graph::{RunArgument, TaskRun};

/// Which of a run's arguments are replaced by a pipe, and from which side.
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamArgs<'a> {
    /// output arguments written to stdout
    pub to_stream: &'a [String],
    /// input arguments read from stdin
    pub from_stream: &'a [String],
}

/// Path of the tool's executable, under the resources directory if one is set.
pub fn executable(tool: &ToolConfig, resources: Option<&Path>) -> String {
    let mut path = match resources {
        Some(dir) => dir.to_string_lossy().trim_end_matches('/').to_owned(),
        None => String::new(),
    };
    for part in [tool.path.as_deref(), Some(tool.executable.as_str())].into_iter().flatten() {
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(part.trim_matches('/'));
    }
    path
}

/// The shell command for one run of a tool.
pub fn command_line(
    tool: &ToolConfig,
    run: &TaskRun,
    resources: Option<&Path>,
    streams: StreamArgs,
) -> String {
    let mut words: Vec<String> = Vec::with_capacity(run.arguments.len() * 2 + 3);
    if let Some(pre) = &tool.precommand {
        words.push(pre.clone());
    }
    words.push(executable(tool, resources));
    if let Some(modifier) = &tool.modifier {
        words.push(modifier.clone());
    }

    for run_arg in &run.arguments {
        let Some(arg) = tool.argument(&run_arg.long_form) else {
            continue;
        };
        if !arg.include_on_command_line {
            continue;
        }
        let handling = if streams.to_stream.contains(&arg.long_form) {
            Some(arg.if_output_to_stream.as_ref())
        } else if streams.from_stream.contains(&arg.long_form) {
            Some(arg.if_input_is_stream.as_ref())
        } else {
            None
        };
        match handling {
            Some(None | Some(StreamHandling::Omit)) => {}
            Some(Some(StreamHandling::Replace(text))) => {
                words.push(arg.command_line_flag().to_owned());
                words.push(text.clone());
            }
            None => push_argument(&mut words, arg, run_arg),
        }
    }
    words.join(" ")
}

fn push_argument(words: &mut Vec<String>, arg: &ToolArgument, run_arg: &RunArgument) {
    let flag = arg.command_line_flag();
    if arg.data_type == DataType::Flag {
        if run_arg.values.iter().any(|v| v == "true") {
            words.push(flag.to_owned());
        }
        return;
    }
    for value in &run_arg.values {
        words.push(flag.to_owned());
        words.push(quote(value));
    }
}

/// Quote a value for the shell if it needs it. Shell substitutions are left alone.
fn quote(value: &str) -> String {
    let plain = |c: char| c.is_ascii_alphanumeric() || "-_./:=,+@%".contains(c);
    if value.starts_with("$(") || value.chars().all(plain) {
        value.to_owned()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use config::Direction;

    const SORT: &str = r#"{
        "id": "sort", "executable": "samtools", "path": "samtools-1.9", "modifier": "sort",
        "arguments": {
            "inputs": [{"long form argument": "--in", "command line argument": "-i", "data type": "string",
                        "if input is stream": {"replace": "-"}}],
            "outputs": [{"long form argument": "--out", "data type": "string", "if output to stream": "omit"}],
            "options": [
                {"long form argument": "--fast", "data type": "flag"},
                {"long form argument": "--label", "data type": "string"},
                {"long form argument": "--internal", "data type": "string", "include on command line": false}
            ]
        },
        "argument order": ["--out", "--in"]
    }"#;

    fn arg(long_form: &str, direction: Direction, values: &[&str]) -> RunArgument {
        RunArgument {
            long_form: long_form.to_owned(),
            direction,
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    fn run() -> TaskRun {
        TaskRun {
            arguments: vec![
                arg("--out", Direction::Output, &["x.bam"]),
                arg("--in", Direction::Input, &["a.bam", "b.bam"]),
                arg("--fast", Direction::Option, &["true"]),
                arg("--label", Direction::Option, &["two words"]),
                arg("--internal", Direction::Option, &["hidden"]),
            ],
            inputs: vec![],
            outputs: vec![],
        }
    }

    #[test]
    fn test_command_line() -> anyhow::Result<()> {
        let tool = ToolConfig::from_json_str(SORT, "sort.json")?;
        assert_eq!(
            command_line(&tool, &run(), Some(Path::new("/opt/res/")), StreamArgs::default()),
            "/opt/res/samtools-1.9/samtools sort --out x.bam -i a.bam -i b.bam --fast --label 'two words'"
        );
        Ok(())
    }

    #[test]
    fn test_stream_arguments() -> anyhow::Result<()> {
        let tool = ToolConfig::from_json_str(SORT, "sort.json")?;
        let out = ["--out".to_owned()];
        let inp = ["--in".to_owned()];
        let producer = command_line(
            &tool,
            &run(),
            None,
            StreamArgs {
                to_stream: &out,
                from_stream: &[],
            },
        );
        assert!(!producer.contains("x.bam"), "{producer}");
        let consumer = command_line(
            &tool,
            &run(),
            None,
            StreamArgs {
                to_stream: &[],
                from_stream: &inp,
            },
        );
        assert!(consumer.starts_with("samtools-1.9/samtools sort --out x.bam -i - --fast"), "{consumer}");
        Ok(())
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("a.bam"), "a.bam");
        assert_eq!(quote("it's"), r"'it'\''s'");
        assert_eq!(quote("$(cut -f1 x)"), "$(cut -f1 x)");
    }
}
