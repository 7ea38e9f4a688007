//! Command-line parsing for `ccb`
//!
//! ```text
//! ccb [--config PATH] authorize
//! ccb [--config PATH] call <METHOD> <PATH>
//! ```

use transport::Method;

pub const USAGE: &str = "usage: ccb [--config PATH] authorize | call <METHOD> <PATH>";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the browser consent flow and save the resulting token
    Authorize,
    /// Call the API with the saved token, printing the raw body
    Call { method: Method, path: String },
}

#[derive(Debug, PartialEq, Eq)]
pub struct Cli {
    pub config: Option<String>,
    pub command: Command,
}

impl Cli {
    /// Parse arguments, excluding the program name.
    pub fn parse<I>(args: I) -> common::Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = None;
        let mut positional = Vec::new();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let path = args
                        .next()
                        .ok_or_else(|| common::Error::Usage("--config requires a path".into()))?;
                    config = Some(path);
                }
                flag if flag.starts_with("--") => {
                    return Err(common::Error::Usage(format!("unknown flag {flag}")));
                }
                _ => positional.push(arg),
            }
        }

        let command = match positional.as_slice() {
            [cmd] if cmd == "authorize" => Command::Authorize,
            [cmd, method, path] if cmd == "call" => Command::Call {
                method: parse_method(method)?,
                path: path.clone(),
            },
            [cmd, ..] if cmd == "call" => {
                return Err(common::Error::Usage(
                    "call takes exactly <METHOD> <PATH>".into(),
                ));
            }
            [] => return Err(common::Error::Usage(USAGE.into())),
            [cmd, ..] => return Err(common::Error::Usage(format!("unknown command {cmd}"))),
        };

        Ok(Self { config, command })
    }
}

fn parse_method(raw: &str) -> common::Result<Method> {
    Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
        .map_err(|_| common::Error::Usage(format!("invalid HTTP method {raw}")))
}
