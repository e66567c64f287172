//! Console command parsing.

use std::str::FromStr;

use atmos_weather::{CityKey, CityQuery, TemperatureUnit};

pub const HELP: &str = "\
Commands:
  add <city>          add a city by name
  add @<lat>,<lon>    add a city by coordinates
  here                add your configured location
  rm <city>           remove a city
  clear               remove every city
  refresh             re-fetch all saved cities
  unit c|f            switch temperature units
  list                show tracked cities
  search <query>      look up matching city names
  help                show this help
  quit                exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add(CityQuery),
    Here,
    Remove(CityKey),
    Clear,
    Refresh,
    Unit(TemperatureUnit),
    List,
    Search(String),
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CommandError {
    #[error("Unknown command '{0}'. Type 'help' for a list.")]
    Unknown(String),

    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),

    #[error("Unknown unit '{0}', expected c or f")]
    BadUnit(String),
}

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let command = match verb.to_lowercase().as_str() {
            "add" | "a" => Command::Add(CityQuery::parse(required("add", rest)?)),
            "here" | "locate" => Command::Here,
            "rm" | "remove" => {
                Command::Remove(CityQuery::parse(required("rm", rest)?).provisional_key())
            }
            "clear" => Command::Clear,
            "refresh" | "r" => Command::Refresh,
            "unit" | "units" => {
                let raw = required("unit", rest)?;
                let unit = TemperatureUnit::from_str(raw)
                    .map_err(|_| CommandError::BadUnit(raw.to_string()))?;
                Command::Unit(unit)
            }
            "list" | "ls" => Command::List,
            "search" | "find" => Command::Search(required("search", rest)?.to_string()),
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };

        Ok(Some(command))
    }
}

fn required<'a>(verb: &'static str, rest: &'a str) -> Result<&'a str, CommandError> {
    if rest.is_empty() {
        Err(CommandError::MissingArgument(verb))
    } else {
        Ok(rest)
    }
}
