//! User-facing status texts
//!
//! All texts are plain (no markup), so file names never need escaping.

pub const LINK_UNAVAILABLE: &str = "Link unavailable";

pub fn downloading(name: &str) -> String {
    format!("📥 Downloading '{}' from Telegram...", name)
}

pub fn uploading(name: &str, destination: &str) -> String {
    format!("⏳ Uploading '{}' to {}...", name, destination)
}

pub fn upload_progress(name: &str, destination: &str, percent: u8) -> String {
    format!("⏳ Uploading '{}' to {}... {}%", name, destination, percent)
}

pub fn upload_succeeded(name: &str, link: Option<&str>) -> String {
    format!(
        "✅ Upload Successful!\n\n📄 File: {}\n🔗 Link: {}",
        name,
        link.unwrap_or(LINK_UNAVAILABLE)
    )
}

pub fn greeting(first_name: Option<&str>) -> String {
    match first_name {
        Some(name) if !name.trim().is_empty() => format!("Hi {}! 👋", name.trim()),
        _ => "Hi! 👋".to_string(),
    }
}

pub fn help(max_file_size_mb: u64, destination: &str) -> String {
    format!(
        "🤖 Welcome to the File to Cloud Bot!\n\n\
         I can upload files you send me directly to {destination}.\n\n\
         How to use:\n\
         1. Just send me any file (document, photo, video, audio).\n\
         2. I will upload it to the configured {destination} folder.\n\
         3. I'll send you back the link.\n\n\
         Commands:\n\
         /start - Start the bot\n\
         /help - Show this help message\n\
         /myfiles - List files uploaded via this bot\n\n\
         File Size Limit: {max_file_size_mb} MB per file."
    )
}
