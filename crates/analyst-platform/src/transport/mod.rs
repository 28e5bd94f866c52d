pub mod websocket;
pub mod push_stream;
pub mod rest_channel;

pub use websocket::WebSocketChannel;
pub use push_stream::PushStreamChannel;
pub use rest_channel::RestChannel;
