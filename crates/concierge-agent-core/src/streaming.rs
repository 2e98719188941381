use std::sync::Arc;

use concierge_ai::StreamDeltaHandler;
use tokio::sync::mpsc;

/// Consumer half of a text fragment stream. Ends once every producer handle is dropped.
pub struct TextFragments {
    receiver: mpsc::UnboundedReceiver<String>,
}

impl TextFragments {
    pub async fn next(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    pub async fn collect_text(mut self) -> String {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment);
        }
        text
    }
}

/// Creates a producer handle for model deltas and the matching fragment receiver.
pub fn text_fragment_channel() -> (StreamDeltaHandler, TextFragments) {
    let (sender, receiver) = mpsc::unbounded_channel::<String>();
    let handler = Arc::new(move |delta: String| {
        let _ = sender.send(delta);
    }) as StreamDeltaHandler;
    (handler, TextFragments { receiver })
}
