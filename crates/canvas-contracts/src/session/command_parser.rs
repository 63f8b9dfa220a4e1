use super::command_registry::{
    Action, CommandSpec, Dimension, DIMENSION_COMMANDS, DOWNLOAD_COMMAND, MODEL_COMMAND,
    NO_ARG_COMMANDS, SEED_COMMAND, TOGGLE_COMMANDS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Enhance,
    NoLogo,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedUpdate {
    Fixed(i64),
    Random,
}

/// Which loaded image(s) of the latest run to save. Indices are 1-based as
/// shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadTarget {
    One(usize),
    All,
}

/// One line of input to the interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Noop,
    Generate(String),
    Help,
    ShowSettings,
    ListModels,
    Regenerate,
    ShowHistory,
    Quit,
    SetWidth(i64),
    SetHeight(i64),
    SetSeed(SeedUpdate),
    SetModel(String),
    SetToggle(Toggle, bool),
    Download(DownloadTarget),
    Invalid { command: String, reason: String },
    Unknown { command: String, arg: String },
}

fn find_action<T: Copy>(command: &str, specs: &[CommandSpec<T>]) -> Option<T> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn split_args(arg: &str) -> Vec<String> {
    match shell_words::split(arg) {
        Ok(parts) => parts.into_iter().filter(|value| !value.is_empty()).collect(),
        Err(_) => arg.split_whitespace().map(str::to_string).collect(),
    }
}

fn single_arg(command: &str, arg: &str) -> Result<String, SessionCommand> {
    let parts = split_args(arg);
    match parts.len() {
        1 => Ok(parts[0].clone()),
        0 => Err(invalid(command, "missing value")),
        _ => Err(invalid(command, "expected a single value")),
    }
}

fn invalid(command: &str, reason: &str) -> SessionCommand {
    SessionCommand::Invalid {
        command: command.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn parse_slash_command(command: &str, arg: &str) -> SessionCommand {
    if let Some(action) = find_action(command, NO_ARG_COMMANDS) {
        return match action {
            Action::Help => SessionCommand::Help,
            Action::ShowSettings => SessionCommand::ShowSettings,
            Action::ListModels => SessionCommand::ListModels,
            Action::Regenerate => SessionCommand::Regenerate,
            Action::ShowHistory => SessionCommand::ShowHistory,
            Action::Quit => SessionCommand::Quit,
        };
    }

    if let Some(dimension) = find_action(command, DIMENSION_COMMANDS) {
        let value = match single_arg(command, arg) {
            Ok(value) => value,
            Err(err) => return err,
        };
        let Ok(parsed) = value.parse::<i64>() else {
            return invalid(command, "expected a whole number");
        };
        return match dimension {
            Dimension::Width => SessionCommand::SetWidth(parsed),
            Dimension::Height => SessionCommand::SetHeight(parsed),
        };
    }

    if TOGGLE_COMMANDS.contains(&command) {
        let value = match single_arg(command, arg) {
            Ok(value) => value,
            Err(err) => return err,
        };
        let Some(enabled) = parse_switch(&value) else {
            return invalid(command, "expected on or off");
        };
        let toggle = match command {
            "enhance" => Toggle::Enhance,
            "nologo" => Toggle::NoLogo,
            _ => Toggle::Private,
        };
        return SessionCommand::SetToggle(toggle, enabled);
    }

    if command == SEED_COMMAND {
        let value = match single_arg(command, arg) {
            Ok(value) => value,
            Err(err) => return err,
        };
        if value.eq_ignore_ascii_case("random") {
            return SessionCommand::SetSeed(SeedUpdate::Random);
        }
        return match value.parse::<i64>() {
            Ok(seed) => SessionCommand::SetSeed(SeedUpdate::Fixed(seed)),
            Err(_) => invalid(command, "expected a whole number or 'random'"),
        };
    }

    if command == MODEL_COMMAND {
        return match single_arg(command, arg) {
            Ok(model) => SessionCommand::SetModel(model),
            Err(err) => err,
        };
    }

    if command == DOWNLOAD_COMMAND {
        let value = match single_arg(command, arg) {
            Ok(value) => value,
            Err(err) => return err,
        };
        if value.eq_ignore_ascii_case("all") {
            return SessionCommand::Download(DownloadTarget::All);
        }
        return match value.parse::<usize>() {
            Ok(index) if index > 0 => SessionCommand::Download(DownloadTarget::One(index)),
            _ => invalid(command, "expected an image number starting at 1, or 'all'"),
        };
    }

    SessionCommand::Unknown {
        command: command.to_string(),
        arg: arg.to_string(),
    }
}

pub fn parse_command(text: &str) -> SessionCommand {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return SessionCommand::Noop;
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();
            return parse_slash_command(&command, arg);
        }
    }

    SessionCommand::Generate(raw_trimmed.to_string())
}
