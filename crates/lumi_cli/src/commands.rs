//! REPL command parsing.

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Exit,
    /// Show the clock overlay
    Time,
    /// Print the current emotion
    Status,
    Music(MusicCommand),
    Chat(String),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MusicCommand {
    Toggle,
    Play,
    Pause,
    Stop,
    Next,
    Prev,
    /// Percent, 0-100
    Volume(f32),
    /// Percent of the track
    Seek(f32),
    List,
    Reload,
    Status,
}

pub const HELP: &str = "\
/time                 显示时间
/status               显示当前情感
/music [toggle]       播放/暂停
/music play|pause|stop|next|prev
/music volume <0-100> 设置音量
/music seek <0-100>   跳转进度
/music list|reload|status
exit | quit           退出";

pub fn parse(line: &str) -> Result<Command> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }
    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        return Ok(Command::Exit);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Chat(line.to_string()));
    };

    let mut words = rest.split_whitespace();
    match words.next().unwrap_or_default() {
        "time" => Ok(Command::Time),
        "status" => Ok(Command::Status),
        "music" => parse_music(words.next(), words.next()).map(Command::Music),
        other => bail!("未知命令 /{}\n{}", other, HELP),
    }
}

fn parse_music(action: Option<&str>, arg: Option<&str>) -> Result<MusicCommand> {
    let percent = |arg: Option<&str>| -> Result<f32> {
        let raw = arg.context("缺少百分比参数")?;
        raw.parse::<f32>()
            .ok()
            .filter(|v| (0.0..=100.0).contains(v))
            .with_context(|| format!("无效的百分比: {}", raw))
    };

    Ok(match action.unwrap_or("toggle") {
        "toggle" => MusicCommand::Toggle,
        "play" => MusicCommand::Play,
        "pause" => MusicCommand::Pause,
        "stop" => MusicCommand::Stop,
        "next" => MusicCommand::Next,
        "prev" => MusicCommand::Prev,
        "volume" | "vol" => MusicCommand::Volume(percent(arg)?),
        "seek" => MusicCommand::Seek(percent(arg)?),
        "list" => MusicCommand::List,
        "reload" => MusicCommand::Reload,
        "status" => MusicCommand::Status,
        other => bail!("未知的音乐命令: {}\n{}", other, HELP),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_words() {
        assert_eq!(parse("exit").unwrap(), Command::Exit);
        assert_eq!(parse(" QUIT ").unwrap(), Command::Exit);
    }

    #[test]
    fn test_chat_and_empty() {
        assert_eq!(parse("   ").unwrap(), Command::Empty);
        assert_eq!(
            parse(" 你好呀 ").unwrap(),
            Command::Chat("你好呀".to_string())
        );
        // Only a leading slash makes a command
        assert_eq!(
            parse("1/2 是多少").unwrap(),
            Command::Chat("1/2 是多少".to_string())
        );
    }

    #[test]
    fn test_slash_commands() {
        assert_eq!(parse("/time").unwrap(), Command::Time);
        assert_eq!(parse("/status").unwrap(), Command::Status);
        assert!(parse("/dance").is_err());
    }

    #[test]
    fn test_music_commands() {
        assert_eq!(parse("/music").unwrap(), Command::Music(MusicCommand::Toggle));
        assert_eq!(parse("/music next").unwrap(), Command::Music(MusicCommand::Next));
        assert_eq!(
            parse("/music volume 30").unwrap(),
            Command::Music(MusicCommand::Volume(30.0))
        );
        assert_eq!(
            parse("/music seek 75.5").unwrap(),
            Command::Music(MusicCommand::Seek(75.5))
        );
        assert!(parse("/music volume").is_err());
        assert!(parse("/music volume 150").is_err());
        assert!(parse("/music rewind").is_err());
    }
}
