#[cfg(feature = "tauri")]
const COMMANDS: &[&str] = &["start", "call"];

fn main() {
    #[cfg(feature = "tauri")]
    tauri_plugin::Builder::new(COMMANDS).build();
}
