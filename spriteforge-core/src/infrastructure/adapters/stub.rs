// spriteforge-core/src/infrastructure/adapters/stub.rs
//
// Offline generator used by `demo` and by tests: replays a scripted queue
// of responses, falling back to echoing the anchor bytes. Lets the whole
// pipeline run without a network or an API key.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::ports::generator::{
    GeneratorError, GeneratorRequest, GeneratorResult, ImageGenerator, PromptPart,
};

#[derive(Debug)]
pub enum StubResponse {
    /// Return these bytes as the generated image.
    Png(Vec<u8>),
    /// Echo the first inline image of the request (the anchor).
    EchoAnchor,
    Error(GeneratorError),
}

#[derive(Default)]
pub struct StubGenerator {
    script: Mutex<VecDeque<StubResponse>>,
    calls: Mutex<Vec<GeneratorRequest>>,
}

impl StubGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(responses: Vec<StubResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn recorded_seeds(&self) -> Vec<Option<u32>> {
        self.calls
            .lock()
            .map(|c| c.iter().map(|r| r.seed).collect())
            .unwrap_or_default()
    }

    fn anchor_bytes(request: &GeneratorRequest) -> Option<Vec<u8>> {
        request.parts.iter().find_map(|p| match p {
            PromptPart::InlinePng { bytes, .. } => Some(bytes.clone()),
            PromptPart::Text(_) => None,
        })
    }
}

#[async_trait]
impl ImageGenerator for StubGenerator {
    async fn generate(&self, request: GeneratorRequest) -> Result<GeneratorResult, GeneratorError> {
        let sampling = request.sampling.clone();
        let anchor = Self::anchor_bytes(&request);

        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request);
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());

        let png_bytes = match next {
            Some(StubResponse::Png(bytes)) => bytes,
            Some(StubResponse::Error(e)) => return Err(e),
            Some(StubResponse::EchoAnchor) | None => anchor.ok_or_else(|| {
                GeneratorError::InvalidResponse("request carried no anchor image".to_string())
            })?,
        };

        Ok(GeneratorResult {
            png_bytes,
            thought_signature: None,
            thought_content: None,
            sampling,
        })
    }

    fn describe(&self) -> String {
        "stub:echo-anchor".to_string()
    }

    async fn close(&self) {}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ports::generator::SamplingParams;

    fn request_with_anchor(bytes: &[u8]) -> GeneratorRequest {
        GeneratorRequest {
            parts: vec![
                PromptPart::InlinePng { label: "[IMAGE 1]".into(), bytes: bytes.to_vec() },
                PromptPart::Text("prompt".into()),
            ],
            seed: Some(7),
            sampling: SamplingParams::default(),
        }
    }

    #[tokio::test]
    async fn test_echoes_anchor_by_default() {
        let stub = StubGenerator::new();
        let result = stub.generate(request_with_anchor(b"anchor-png")).await.unwrap();
        assert_eq!(result.png_bytes, b"anchor-png");
        assert_eq!(stub.call_count(), 1);
        assert_eq!(stub.recorded_seeds(), vec![Some(7)]);
    }

    #[tokio::test]
    async fn test_script_takes_precedence() {
        let stub = StubGenerator::with_script(vec![
            StubResponse::Png(b"scripted".to_vec()),
            StubResponse::EchoAnchor,
        ]);

        let first = stub.generate(request_with_anchor(b"anchor")).await.unwrap();
        assert_eq!(first.png_bytes, b"scripted");

        let second = stub.generate(request_with_anchor(b"anchor")).await.unwrap();
        assert_eq!(second.png_bytes, b"anchor");
    }

    #[tokio::test]
    async fn test_scripted_error_propagates() {
        let stub = StubGenerator::with_script(vec![StubResponse::Error(
            GeneratorError::Unavailable("down".into()),
        )]);
        let err = stub.generate(request_with_anchor(b"a")).await.unwrap_err();
        assert!(matches!(err, GeneratorError::Unavailable(_)));
    }
}
