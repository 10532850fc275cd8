use anyhow::Result;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Instruction sent ahead of an image.
pub const IMAGE_INSTRUCTION: &str = "次の画像を褒めてください。";

/// Wrap the user's text in the fixed praise instruction
pub fn text_prompt(text: &str) -> String {
    format!("次の内容を褒めてください。「{}」", text)
}

/// Boundary to the remote generative model.
///
/// Implementations are stateless with respect to the transcript: plain data in, reply text out.
pub trait Gateway {
    fn reply_to_text(&self, text: &str) -> impl Future<Output = Result<String>> + Send;

    fn reply_to_image(&self, path: &Path) -> impl Future<Output = Result<String>> + Send;
}

/// What a submission asks the gateway for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeRequest {
    Text(String),
    Image(PathBuf),
}

impl ExchangeRequest {
    pub async fn send<G: Gateway>(&self, gateway: &G) -> Result<String> {
        match self {
            ExchangeRequest::Text(text) => gateway.reply_to_text(text).await,
            ExchangeRequest::Image(path) => gateway.reply_to_image(path).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct Echo;

    impl Gateway for Echo {
        async fn reply_to_text(&self, text: &str) -> Result<String> {
            Ok(format!("text:{}", text))
        }

        async fn reply_to_image(&self, path: &Path) -> Result<String> {
            Err(anyhow!("cannot read {}", path.display()))
        }
    }

    #[test]
    fn test_text_prompt_wraps_input() {
        assert_eq!(text_prompt("ラーメン"), "次の内容を褒めてください。「ラーメン」");
    }

    #[tokio::test]
    async fn test_send_dispatches_by_kind() {
        let reply = ExchangeRequest::Text("hi".to_string()).send(&Echo).await.unwrap();
        assert_eq!(reply, "text:hi");

        let err = ExchangeRequest::Image(PathBuf::from("/nope.png"))
            .send(&Echo)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/nope.png"));
    }
}
