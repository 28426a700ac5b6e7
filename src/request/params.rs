//! Query argument extraction for `GET /`.

use url::form_urlencoded;

/// Arguments of an image request, taken from the raw query string.
///
/// Each field is `None` when the argument is absent. Present arguments are
/// whitespace-trimmed and may be empty; when an argument is repeated the
/// last occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageQuery {
    pub url: Option<String>,
    pub op: Option<String>,
    pub client: Option<String>,

    // resize
    pub w: Option<String>,
    pub h: Option<String>,
    pub mode: Option<String>,
    pub filter: Option<String>,
    pub pos: Option<String>,
    pub bg: Option<String>,
    pub retain: Option<String>,

    // rotate
    pub deg: Option<String>,
    pub expand: Option<String>,

    // region
    pub rect: Option<String>,

    // watermark
    pub watermark_img: Option<String>,
    pub watermark_txt: Option<String>,
    pub watermark_pos: Option<String>,
    pub watermark_txt_size: Option<String>,
    pub watermark_txt_color: Option<String>,
    pub watermark_img_ratio: Option<String>,

    // save
    pub fmt: Option<String>,
    pub opt: Option<String>,
    pub q: Option<String>,
    pub prog: Option<String>,
    pub exif: Option<String>,
}

impl ImageQuery {
    /// Parse a raw (still percent-encoded) query string.
    ///
    /// Unknown arguments, including `sig`, are ignored here; the signature
    /// is checked against the raw query by the validator.
    pub fn parse(raw: &str) -> Self {
        let mut query = ImageQuery::default();

        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            let value = Some(value.trim().to_string());
            match key.as_ref() {
                "url" => query.url = value,
                "op" => query.op = value,
                "client" => query.client = value,
                "w" => query.w = value,
                "h" => query.h = value,
                "mode" => query.mode = value,
                "filter" => query.filter = value,
                "pos" => query.pos = value,
                "bg" => query.bg = value,
                "retain" => query.retain = value,
                "deg" => query.deg = value,
                "expand" => query.expand = value,
                "rect" => query.rect = value,
                "watermark_img" => query.watermark_img = value,
                "watermark_txt" => query.watermark_txt = value,
                "watermark_pos" => query.watermark_pos = value,
                "watermark_txt_size" => query.watermark_txt_size = value,
                "watermark_txt_color" => query.watermark_txt_color = value,
                "watermark_img_ratio" => query.watermark_img_ratio = value,
                "fmt" => query.fmt = value,
                "opt" => query.opt = value,
                "q" => query.q = value,
                "prog" => query.prog = value,
                "exif" => query.exif = value,
                _ => {}
            }
        }

        query
    }
}
