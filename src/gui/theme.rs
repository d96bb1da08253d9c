use eframe::egui::{
    self,
    RichText,
};
use egui::{
    epaint::Shadow,
    style::{
        Selection,
        WidgetVisuals,
    },
    Color32,
    Stroke,
    Visuals,
};

use crate::core::models::Rgb;

#[derive(Clone)]
pub struct Theme {
    dark: Palette,
    light: Palette,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dracula()
    }
}

impl Theme {
    pub fn dracula() -> Self {
        Self { dark: Palette::dracula(), light: Palette::dracula_light() }
    }

    fn palette(&self, ctx: &egui::Context) -> &Palette {
        if ctx.style().visuals.dark_mode {
            &self.dark
        } else {
            &self.light
        }
    }

    pub fn heading(&self, ctx: &egui::Context, content: &str) -> RichText {
        RichText::new(content).color(self.palette(ctx).purple).strong()
    }

    pub fn red(&self, ctx: &egui::Context) -> Color32 {
        self.palette(ctx).red
    }

    pub fn green(&self, ctx: &egui::Context) -> Color32 {
        self.palette(ctx).green
    }

    pub fn cyan(&self, ctx: &egui::Context) -> Color32 {
        self.palette(ctx).cyan
    }

    pub fn comment(&self, ctx: &egui::Context) -> Color32 {
        self.palette(ctx).comment
    }

    /// Fill for a notation cell: the action color toned toward the panel background.
    pub fn cell_fill(&self, ctx: &egui::Context, color: Option<Rgb>) -> Color32 {
        let palette = self.palette(ctx);
        match color {
            Some(rgb) => blend_colors(palette.background_light, to_color32(rgb), 0.45),
            None => palette.background_light,
        }
    }

    pub fn apply(&self, ctx: &egui::Context) {
        set_visuals(ctx, &self.dark, true);
        set_visuals(ctx, &self.light, false);
    }
}

pub fn to_color32(rgb: Rgb) -> Color32 {
    Color32::from_rgb(rgb.r, rgb.g, rgb.b)
}

pub fn from_color32(color: Color32) -> Rgb {
    Rgb::new(color.r(), color.g(), color.b())
}

pub fn blend_colors(color_a: Color32, color_b: Color32, t: f32) -> Color32 {
    let blend_channel = |a: u8, b: u8| ((1.0 - t) * (a as f32) + t * (b as f32)).round() as u8;
    Color32::from_rgba_unmultiplied(
        blend_channel(color_a.r(), color_b.r()),
        blend_channel(color_a.g(), color_b.g()),
        blend_channel(color_a.b(), color_b.b()),
        blend_channel(color_a.a(), color_b.a()),
    )
}

#[derive(Clone)]
struct Palette {
    background: Color32,
    foreground: Color32,
    selection: Color32,
    comment: Color32,
    red: Color32,
    orange: Color32,
    green: Color32,
    purple: Color32,
    cyan: Color32,
    background_darker: Color32,
    background_dark: Color32,
    background_light: Color32,
}

impl Palette {
    fn dracula() -> Self {
        Self {
            background: Color32::from_rgb(0x28, 0x2a, 0x36),
            foreground: Color32::from_rgb(0xf8, 0xf8, 0xf2),
            selection: Color32::from_rgb(0x44, 0x47, 0x5a),
            comment: Color32::from_rgb(0x62, 0x72, 0xa4),
            red: Color32::from_rgb(0xff, 0x55, 0x55),
            orange: Color32::from_rgb(0xff, 0xb8, 0x6c),
            green: Color32::from_rgb(0x50, 0xfa, 0x7b),
            purple: Color32::from_rgb(189, 147, 249),
            cyan: Color32::from_rgb(139, 233, 253),
            background_darker: Color32::from_rgb(25, 26, 33),
            background_dark: Color32::from_rgb(33, 35, 53),
            background_light: Color32::from_rgb(52, 54, 66),
        }
    }

    fn dracula_light() -> Self {
        Self {
            background: Color32::from_rgb(248, 248, 242),
            foreground: Color32::from_rgb(40, 42, 54),
            selection: Color32::from_rgb(200, 200, 220),
            comment: Color32::from_rgb(120, 130, 160),
            red: Color32::from_rgb(200, 80, 80),
            orange: Color32::from_rgb(220, 150, 90),
            green: Color32::from_rgb(60, 160, 90),
            purple: Color32::from_rgb(150, 120, 220),
            cyan: Color32::from_rgb(60, 150, 200),
            background_darker: Color32::from_rgb(235, 235, 230),
            background_dark: Color32::from_rgb(245, 245, 240),
            background_light: Color32::from_rgb(255, 255, 250),
        }
    }

    fn widget(&self, base: WidgetVisuals, fill: Color32, outline: Color32) -> WidgetVisuals {
        WidgetVisuals {
            bg_fill: fill,
            weak_bg_fill: fill,
            bg_stroke: Stroke { color: outline, ..base.bg_stroke },
            fg_stroke: Stroke { color: self.foreground, ..base.fg_stroke },
            ..base
        }
    }
}

fn set_visuals(ctx: &egui::Context, palette: &Palette, is_dark: bool) {
    let (default, variant) = match is_dark {
        true => (Visuals::dark(), egui::Theme::Dark),
        false => (Visuals::light(), egui::Theme::Light),
    };

    let mut visuals = Visuals {
        dark_mode: is_dark,
        selection: Selection {
            bg_fill: palette.selection,
            stroke: Stroke { color: palette.foreground, ..default.selection.stroke },
        },
        hyperlink_color: palette.cyan,
        faint_bg_color: palette.background_dark,
        extreme_bg_color: palette.background_darker,
        code_bg_color: palette.background_dark,
        error_fg_color: palette.red,
        warn_fg_color: palette.orange,
        window_shadow: Shadow { color: palette.background_darker, ..default.window_shadow },
        window_fill: palette.background,
        window_stroke: Stroke { color: palette.background_light, ..default.window_stroke },
        panel_fill: palette.background_dark,
        ..default.clone()
    };

    let widgets = &mut visuals.widgets;
    widgets.noninteractive =
        palette.widget(default.widgets.noninteractive, palette.background, palette.background_dark);
    widgets.inactive =
        palette.widget(default.widgets.inactive, palette.background_light, palette.background_dark);
    widgets.hovered = palette.widget(default.widgets.hovered, palette.selection, palette.cyan);
    widgets.active = palette.widget(default.widgets.active, palette.selection, palette.cyan);
    widgets.open = palette.widget(default.widgets.open, palette.background_dark, palette.purple);

    ctx.set_visuals_of(variant, visuals);
}
