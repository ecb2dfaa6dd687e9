//! Image property inspection (dimensions, color, container format).

use crate::coords::round_to;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
    pub resolution: String,
    pub aspect_ratio: f64,
    pub megapixels: f64,
    pub orientation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColorInfo {
    pub mode: String,
    pub has_transparency: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TechnicalInfo {
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageProperties {
    pub dimensions: Dimensions,
    pub color_info: ColorInfo,
    pub technical: TechnicalInfo,
}

/// Inspect a decoded image.
pub fn inspect(image: &DynamicImage, format: ImageFormat) -> ImageProperties {
    let (width, height) = image.dimensions();

    let orientation = if width > height {
        "landscape"
    } else if height > width {
        "portrait"
    } else {
        "square"
    };

    let color = image.color();
    let (format_name, format_description) = format_names(format);

    ImageProperties {
        dimensions: Dimensions {
            width,
            height,
            resolution: format!("{}x{}", width, height),
            aspect_ratio: round_to(f64::from(width) / f64::from(height), 3),
            megapixels: round_to(f64::from(width) * f64::from(height) / 1_000_000.0, 2),
            orientation: orientation.to_string(),
        },
        color_info: ColorInfo {
            mode: color_mode(color),
            has_transparency: color.has_alpha(),
        },
        technical: TechnicalInfo {
            format: format_name,
            format_description,
        },
    }
}

fn color_mode(color: ColorType) -> String {
    match color {
        ColorType::L8 => "L".to_string(),
        ColorType::La8 => "LA".to_string(),
        ColorType::Rgb8 => "RGB".to_string(),
        ColorType::Rgba8 => "RGBA".to_string(),
        ColorType::L16 => "L16".to_string(),
        ColorType::La16 => "LA16".to_string(),
        ColorType::Rgb16 => "RGB16".to_string(),
        ColorType::Rgba16 => "RGBA16".to_string(),
        other => format!("{:?}", other),
    }
}

fn format_names(format: ImageFormat) -> (String, Option<String>) {
    let description = match format {
        ImageFormat::Jpeg => Some("JPEG (ISO 10918)"),
        ImageFormat::Png => Some("Portable Network Graphics"),
        ImageFormat::Gif => Some("Graphics Interchange Format"),
        ImageFormat::WebP => Some("WebP"),
        ImageFormat::Tiff => Some("Tagged Image File Format"),
        ImageFormat::Bmp => Some("Windows Bitmap"),
        ImageFormat::Ico => Some("Windows Icon"),
        _ => None,
    };
    (
        format!("{:?}", format).to_uppercase(),
        description.map(str::to_string),
    )
}
