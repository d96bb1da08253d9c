pub mod book;
pub mod video;

pub use book::{
    MemoBook,
    MemoEntry,
    MEMO_FILE,
};
pub use video::{
    format_timestamp,
    parse_timestamp,
    parse_video_id,
    watch_url,
};
