//! Shared UI icons.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");

// Pipeline indicators
pub static PLAN: Emoji<'_, '_> = Emoji("📋 ", "[PLAN]");
pub static BATCH: Emoji<'_, '_> = Emoji("📦 ", "[B]");
pub static REVIEW: Emoji<'_, '_> = Emoji("🔍 ", "[R]");
pub static ESCALATE: Emoji<'_, '_> = Emoji("🔄 ", "[ESC]");
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
