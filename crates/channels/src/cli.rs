//! CLI channel: interactive terminal-based chat.
//!
//! Reads turns from stdin and prints replies to stdout. The terminal is one
//! conversation with the key `cli`. A line is addressed to the assistant when
//! it mentions the assistant, or always when `always_respond` is set.
//!
//! `/image <path> [caption]` attaches an image file to the turn.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use minerva_core::channel::{Channel, ChannelMessage, ReplyTarget};
use minerva_core::error::ChannelError;
use minerva_core::message::{ConversationKey, Image};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

pub const CLI_CHAT_ID: &str = "cli";

const IMAGE_COMMAND: &str = "/image";

/// Terminal-side identity and behavior.
#[derive(Debug, Clone)]
pub struct CliSettings {
    /// Username of the person at the terminal
    pub username: String,
    /// Text that addresses the assistant, e.g. `@minerva`
    pub ai_mention: String,
    /// Display name printed before replies
    pub ai_name: String,
    /// Treat every line as addressed to the assistant
    pub always_respond: bool,
    /// Where documents sent by the assistant are written
    pub download_dir: PathBuf,
}

impl Default for CliSettings {
    fn default() -> Self {
        Self {
            username: "user".into(),
            ai_mention: "@minerva".into(),
            ai_name: "Minerva".into(),
            always_respond: false,
            download_dir: PathBuf::from("."),
        }
    }
}

/// What one line of terminal input amounts to.
#[derive(Debug)]
pub enum Input {
    Message(ChannelMessage),
    Skip,
    Exit,
}

/// Interactive CLI channel for terminal-based chat.
pub struct CliChannel {
    settings: CliSettings,
}

impl CliChannel {
    pub fn new(settings: CliSettings) -> Self {
        Self { settings }
    }

    pub fn key() -> ConversationKey {
        ConversationKey::new(CLI_CHAT_ID)
    }

    pub fn settings(&self) -> &CliSettings {
        &self.settings
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new(CliSettings::default())
    }
}

/// Interpret one line typed at the terminal.
pub async fn read_input(line: &str, settings: &CliSettings) -> Result<Input, ChannelError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Skip);
    }

    // Check for exit commands
    if matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q") {
        return Ok(Input::Exit);
    }

    let (text, images) = match line.strip_prefix(IMAGE_COMMAND) {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
            let rest = rest.trim_start();
            let (path, caption) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            if path.is_empty() {
                return Err(ChannelError::InvalidInput("usage: /image <path> [caption]".into()));
            }
            let image = load_image(Path::new(path)).await?;
            let caption = caption.trim();
            let text = (!caption.is_empty()).then(|| caption.to_string());
            (text, vec![image])
        }
        _ => (Some(line.to_string()), Vec::new()),
    };

    let addressed = settings.always_respond
        || text
            .as_deref()
            .is_some_and(|t| t.contains(&settings.ai_mention));

    Ok(Input::Message(ChannelMessage {
        key: CliChannel::key(),
        message_id: uuid::Uuid::new_v4().to_string(),
        sender_id: "local_user".into(),
        sender_username: Some(settings.username.clone()),
        text,
        images,
        addressed,
    }))
}

/// Read an image file into a `data:` URL with its pixel dimensions.
pub async fn load_image(path: &Path) -> Result<Image, ChannelError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ChannelError::InvalidInput(format!("cannot read {}: {e}", path.display())))?;

    let format = image::guess_format(&bytes)
        .map_err(|e| ChannelError::InvalidInput(format!("{} is not an image: {e}", path.display())))?;
    let (width, height) = image::ImageReader::with_format(Cursor::new(&bytes), format)
        .into_dimensions()
        .map_err(|e| ChannelError::InvalidInput(format!("cannot decode {}: {e}", path.display())))?;

    debug!(path = %path.display(), width, height, "Loaded image");
    let url = format!("data:{};base64,{}", format.to_mime_type(), BASE64.encode(&bytes));
    Ok(Image::new(url, width, height))
}

/// Keep only the final path component so documents stay in the download dir.
fn safe_filename(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("document.txt")
        .to_string()
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let settings = self.settings.clone();

        tokio::spawn(async move {
            let stdin = io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let inbound = match read_input(&line, &settings).await {
                            Ok(Input::Message(msg)) => Ok(msg),
                            Ok(Input::Skip) => continue,
                            Ok(Input::Exit) => break,
                            // Bad input is reported, the session keeps going
                            Err(e) => Err(e),
                        };
                        if tx.send(inbound).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(&self, _target: &ReplyTarget, content: &str) -> Result<(), ChannelError> {
        println!();
        for line in content.lines() {
            println!("  {} > {line}", self.settings.ai_name);
        }
        println!();
        Ok(())
    }

    async fn send_document(&self, _target: &ReplyTarget, filename: &str, bytes: &[u8]) -> Result<(), ChannelError> {
        let path = self.settings.download_dir.join(safe_filename(filename));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ChannelError::DeliveryFailed {
                channel: "cli".into(),
                reason: format!("cannot write {}: {e}", path.display()),
            })?;

        info!(path = %path.display(), bytes = bytes.len(), "Saved document");
        println!("  [file saved: {}]", path.display());
        Ok(())
    }
}
