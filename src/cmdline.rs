use graph::{Request, TaskBlock};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Value \"{0}\" on the command line doesn't follow an argument")]
    DanglingValue(String),
    #[error("Task block for \"{0}\" is missing its closing \"]\"")]
    UnclosedBlock(String),
    #[error("Unexpected \"{0}\" on the command line")]
    UnexpectedBracket(String),
}

impl util::Categorize for Error {
    fn category(&self) -> util::ErrorCategory {
        util::ErrorCategory::CommandLine
    }
}

const OPEN: &str = "[";
const CLOSE: &str = "]";

/// Value given to an argument that appears with no values, i.e. a flag.
pub const FLAG_SET: &str = "true";

/// Split the tokens after the pipeline name into argument values and task blocks.
///
/// `--arg v1 v2` gives `--arg` two values; `--task [--arg v]` scopes
/// the arguments inside the brackets to one task.
pub fn split_pipeline_args<S: AsRef<str>>(tokens: &[S]) -> Result<Request, Error> {
    let mut request = Request::default();
    let mut iter = tokens.iter().map(AsRef::as_ref).peekable();

    while let Some(token) = iter.next() {
        if !is_flag(token) {
            return Err(match token {
                OPEN | CLOSE => Error::UnexpectedBracket(token.to_owned()),
                _ => Error::DanglingValue(token.to_owned()),
            });
        }
        let name = token.to_owned();

        if iter.peek() == Some(&OPEN) {
            iter.next();
            let mut inner = Vec::new();
            loop {
                match iter.next() {
                    Some(CLOSE) => break,
                    Some(OPEN) => return Err(Error::UnexpectedBracket(OPEN.to_owned())),
                    Some(t) => inner.push(t),
                    None => return Err(Error::UnclosedBlock(name)),
                }
            }
            let task = name.trim_start_matches('-').to_owned();
            let args = split_pipeline_args(&inner)?.args;
            log::debug!("task block for {task}: {args:?}");
            request.task_blocks.push(TaskBlock { task, args });
            continue;
        }

        let mut values = Vec::new();
        while let Some(next) = iter.peek() {
            if is_flag(next) || *next == OPEN || *next == CLOSE {
                break;
            }
            values.push((*next).to_owned());
            iter.next();
        }
        if values.is_empty() {
            values.push(FLAG_SET.to_owned());
        }
        request.args.push((name, values));
    }
    Ok(request)
}

/// Arguments start with '-'; negative numbers are values.
fn is_flag(token: &str) -> bool {
    token.starts_with('-')
        && token.len() > 1
        && !token[1..].starts_with(|c: char| c.is_ascii_digit() || c == '.')
}
