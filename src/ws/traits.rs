//! Core traits for generic WebSocket infrastructure.

/// Message parser trait for converting raw text frames to messages.
///
/// The parser decides what a frame means: it may return several messages, or an
/// empty vec when the frame carries nothing the consumer cares about.
///
/// # Example
///
/// ```ignore
/// pub struct SimpleParser;
///
/// impl MessageParser<MyMessage> for SimpleParser {
///     fn parse(&self, bytes: &[u8]) -> crate::Result<Vec<MyMessage>> {
///         let msg: MyMessage = serde_json::from_slice(bytes)?;
///         Ok(vec![msg])
///     }
/// }
/// ```
pub trait MessageParser<M>: Send + Sync + 'static {
    /// Parse incoming bytes into messages.
    fn parse(&self, bytes: &[u8]) -> crate::Result<Vec<M>>;
}
