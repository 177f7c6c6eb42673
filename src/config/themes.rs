use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ThemeName {
    #[default]
    Light,
    Dark,
}

impl ThemeName {
    pub fn toggled(self) -> Self {
        match self {
            ThemeName::Light => ThemeName::Dark,
            ThemeName::Dark => ThemeName::Light,
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            ThemeName::Light => Palette {
                text: Color::Black,
                muted: Color::DarkGray,
                accent: Color::Blue,
                border: Color::Gray,
                selection_bg: Color::LightBlue,
                overdue: Color::Red,
                due_soon: Color::Rgb(180, 110, 0),
                good: Color::Green,
            },
            ThemeName::Dark => Palette {
                text: Color::White,
                muted: Color::Gray,
                accent: Color::Cyan,
                border: Color::DarkGray,
                selection_bg: Color::Blue,
                overdue: Color::LightRed,
                due_soon: Color::Yellow,
                good: Color::LightGreen,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub border: Color,
    pub selection_bg: Color,
    pub overdue: Color,
    pub due_soon: Color,
    pub good: Color,
}
