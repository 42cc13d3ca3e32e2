use std::fs::File;
use std::io::{stderr, stdout, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{anyhow, Context, Result};
use colored::Colorize;

/// Run a subprocess, copying stdout and stderr both to the terminal and to `log_path`.
/// Based on:
/// <https://stackoverflow.com/questions/66060139/how-to-tee-stdout-stderr-from-a-subprocess-in-rust>
pub fn run_cmd(cmd: &mut Command, log_path: &Path, verbose: bool) -> Result<bool> {
    let out_file = File::create(log_path).context("creating log file")?;
    let err_file = out_file.try_clone().context("sharing log file")?;

    if verbose {
        eprintln!("{}", "Running command...".magenta());
    }
    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| {
            format!(
                "failed to execute child process {:?} {:?}",
                cmd.get_program(),
                cmd.get_args().collect::<Vec<_>>(),
            )
        })?;

    let child_out = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("cannot attach to child stdout"))?;
    let child_err = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("cannot attach to child stderr"))?;

    let thread_out = thread::spawn(move || communicate(child_out, out_file, stdout()));
    let thread_err = thread::spawn(move || communicate(child_err, err_file, stderr()));

    thread_out
        .join()
        .map_err(|_| anyhow!("error joining stdout thread"))?
        .context("error communicating with child stdout")?;
    thread_err
        .join()
        .map_err(|_| anyhow!("error joining stderr thread"))?
        .context("error communicating with child stderr")?;

    let status = child.wait().context("failed to wait on child process")?;

    if verbose {
        eprintln!("\n{} with {status}.", "Process finished".green());
    }
    Ok(status.success())
}

fn communicate<R: Read, W: Write>(
    mut stream: R,
    mut file: File,
    mut output: W,
) -> std::io::Result<()> {
    let mut buf = [0u8; 1024];
    loop {
        let num_read = stream.read(&mut buf)?;
        if num_read == 0 {
            break;
        }

        let buf = &buf[..num_read];
        file.write_all(buf)?;
        output.write_all(buf)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_output_is_logged() -> Result<()> {
        let dir = tempdir()?;
        let log = dir.path().join("out.log");
        let ok = run_cmd(Command::new("sh").args(["-c", "echo hello; exit 3"]), &log, false)?;
        assert!(!ok);
        assert_eq!(std::fs::read_to_string(&log)?, "hello\n");
        Ok(())
    }
}
