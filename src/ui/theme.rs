use ratatui::style::Color;

/// Dark palette shared by every card.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub background: Color,
    pub border: Color,
    pub text_main: Color,
    pub text_muted: Color,
    pub gauge_track: Color,
    pub cpu: Color,
    pub memory: Color,
    pub gpu: Color,
    pub battery: Color,
    pub clock: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            background: hex(0x0B0F14),
            border: hex(0x1F2937),
            text_main: hex(0xE5E7EB),
            text_muted: hex(0x9CA3AF),
            gauge_track: hex(0x020617),
            cpu: hex(0x6366F1),
            memory: hex(0xEC4899),
            gpu: hex(0x22C55E),
            battery: hex(0xF59E0B),
            clock: hex(0x38BDF8),
        }
    }
}

const fn hex(rgb: u32) -> Color {
    Color::Rgb((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_splits_channels() {
        assert_eq!(hex(0x6366F1), Color::Rgb(0x63, 0x66, 0xF1));
        assert_eq!(Theme::default().clock, Color::Rgb(0x38, 0xBD, 0xF8));
    }
}
