pub mod bulk_writer;
pub mod game_handle;
pub mod streaming_writer;
pub mod traits;

pub use bulk_writer::BulkEventWriter;
pub use game_handle::GameHandle;
pub use streaming_writer::StreamingEventWriter;
pub use traits::EventLogWriter;
