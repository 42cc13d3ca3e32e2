use serde::{Deserialize, Serialize};

/// Instructions for synthesizing a filename that the user didn't supply.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "method", deny_unknown_fields)]
pub enum ConstructionRecipe {
    /// Derive the name from the value(s) of another argument of the same task.
    #[serde(rename = "from tool argument")]
    FromToolArgument {
        #[serde(rename = "use argument")]
        use_argument: String,
        #[serde(rename = "modify text", default)]
        modify_text: Vec<TextModification>,
        #[serde(rename = "modify extension", default)]
        modify_extension: ExtensionPolicy,
    },
    /// A fixed name, optionally placed in the directory given by another argument.
    #[serde(rename = "known filename")]
    KnownFilename {
        filename: String,
        #[serde(rename = "directory argument", default)]
        directory_argument: Option<String>,
    },
}

impl ConstructionRecipe {
    /// Names of every other argument this recipe reads values from.
    pub fn referenced_arguments(&self) -> Vec<&str> {
        match self {
            Self::FromToolArgument {
                use_argument,
                modify_text,
                ..
            } => {
                let mut refs = vec![use_argument.as_str()];
                for m in modify_text {
                    if let TextModification::AddArgumentValues(arg) = m {
                        refs.push(arg);
                    }
                }
                refs
            }
            Self::KnownFilename {
                directory_argument, ..
            } => directory_argument.iter().map(String::as_str).collect(),
        }
    }
}

/// A single step applied to the base of a constructed filename.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum TextModification {
    #[serde(rename = "add text")]
    AddText(String),
    #[serde(rename = "add argument values")]
    AddArgumentValues(String),
}

/// How the constructed file's extension relates to the source value's extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionPolicy {
    /// drop the source extension and add the output's own.
    #[default]
    Replace,
    /// keep the source extension and add the output's own after it.
    Append,
    /// keep the source extension only.
    Retain,
    /// no extension at all.
    Omit,
}

impl ExtensionPolicy {
    /// Whether this policy needs the output argument to declare an extension.
    pub fn needs_new_extension(self) -> bool {
        matches!(self, Self::Replace | Self::Append)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_from_tool_argument() -> anyhow::Result<()> {
        let recipe: ConstructionRecipe = serde_json::from_str(
            r#"{
                "method": "from tool argument",
                "use argument": "--in",
                "modify text": [{"add text": "_sorted"}, {"add argument values": "--region"}],
                "modify extension": "append"
            }"#,
        )?;
        assert_eq!(recipe.referenced_arguments(), vec!["--in", "--region"]);
        match recipe {
            ConstructionRecipe::FromToolArgument {
                modify_extension, ..
            } => assert_eq!(modify_extension, ExtensionPolicy::Append),
            _ => panic!("wrong method"),
        }
        Ok(())
    }

    #[test]
    fn test_parse_known_filename() -> anyhow::Result<()> {
        let recipe: ConstructionRecipe = serde_json::from_str(
            r#"{"method": "known filename", "filename": "metrics.txt", "directory argument": "--outdir"}"#,
        )?;
        assert_eq!(recipe.referenced_arguments(), vec!["--outdir"]);
        Ok(())
    }

    #[test]
    fn test_reject_unknown_method() {
        let res: Result<ConstructionRecipe, _> =
            serde_json::from_str(r#"{"method": "guess", "use argument": "--in"}"#);
        assert!(res.is_err());
    }
}
