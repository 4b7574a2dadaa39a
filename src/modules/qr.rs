//! QR challenge rendering for the `/show-qr` login page.

use std::io::Cursor;

use base64::Engine;
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;

use crate::error::{AppError, AppResult};

const MIN_SIZE: u32 = 256;

/// Encode a challenge as a PNG `data:` URL.
pub fn to_data_url(challenge: &str) -> AppResult<String> {
    let payload = challenge.trim();
    if payload.is_empty() {
        return Err(AppError::Qr("QR payload is empty".to_string()));
    }

    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| AppError::Qr(format!("Failed to encode QR payload: {}", e)))?;
    let img = code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .min_dimensions(MIN_SIZE, MIN_SIZE)
        .build();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| AppError::Qr(format!("Failed to encode PNG: {}", e)))?;

    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&png)
    ))
}

pub fn qr_page(data_url: &str) -> String {
    format!(
        r#"<html>
    <body>
        <h1>Scan the QR code with WhatsApp</h1>
        <img src="{}" alt="QR Code" />
    </body>
</html>
"#,
        data_url
    )
}
