//! Content generators. Each one wraps a single external API and degrades to a
//! fixed fallback value when the API is unavailable or fails.

pub mod image;
pub mod meme;
pub mod text;
pub mod video;

pub use image::ImageGenerator;
pub use meme::MemeGenerator;
pub use text::TextGenerator;
pub use video::VideoGenerator;

pub const PLACEHOLDER_IMAGE: &str = "/placeholder_image_url.jpg";
pub const PLACEHOLDER_MEME: &str = "/placeholder_meme_url.jpg";
pub const PLACEHOLDER_VIDEO: &str = "/placeholder_video_url.mp4";

/// Truncate to at most `max_chars` characters, marking the cut with "...".
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let keep = max_chars.saturating_sub(3);
        format!("{}...", s.chars().take(keep).collect::<String>())
    }
}
