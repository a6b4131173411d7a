pub mod traits;
pub mod telegram;
pub mod console;

pub use self::console::ConsoleTransport;
pub use self::telegram::TelegramTransport;
pub use self::traits::Transport;
