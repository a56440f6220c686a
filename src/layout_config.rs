//! Paginated document IR handed from pagination (and the image reinsertion
//! step) to the PDF writer. Coordinates are points, page-local, with the
//! origin at the top-left corner of the page.

use serde::{Deserialize, Serialize};

const UNTITLED: &str = "pdf-splice output";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "untitled")]
    pub title: String,
    /// Every page shares one size.
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub pages: Vec<PageLayout>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: usize,
    /// Painted in order; later boxes cover earlier ones.
    pub boxes: Vec<LayoutBox>,
}

/// A rectangle on one page and what to paint in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<Stroke>,
    /// A single line of text set from the top-left corner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextRun>,
    /// Stretched over the whole box.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageFill>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub width_pt: f32,
    pub color: [f32; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub size_pt: f32,
    pub bold: bool,
    pub italic: bool,
    pub color: [f32; 4],
    pub underline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFill {
    pub data_uri: String,
}

fn untitled() -> String {
    UNTITLED.to_string()
}

impl LayoutConfig {
    /// One empty page of `page_width_pt` × `page_height_pt`.
    pub fn new(title: &str, page_width_pt: f32, page_height_pt: f32) -> Self {
        let mut config = Self {
            title: title.to_string(),
            page_width_pt,
            page_height_pt,
            pages: Vec::new(),
        };
        config.page_mut(0);
        config
    }

    /// The page at `index`, appending blank pages up to it.
    pub fn page_mut(&mut self, index: usize) -> &mut PageLayout {
        while self.pages.len() <= index {
            let page_index = self.pages.len();
            self.pages.push(PageLayout {
                page_index,
                boxes: Vec::new(),
            });
        }
        &mut self.pages[index]
    }

    pub fn boxes(&self) -> impl Iterator<Item = &LayoutBox> {
        self.pages.iter().flat_map(|p| p.boxes.iter())
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("invalid layout config: {e}"))
    }
}

impl LayoutBox {
    /// An empty box; set the paint fields afterwards.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            fill: None,
            stroke: None,
            text: None,
            image: None,
        }
    }

    pub fn image(x: f32, y: f32, width: f32, height: f32, data_uri: String) -> Self {
        Self {
            image: Some(ImageFill { data_uri }),
            ..Self::new(x, y, width, height)
        }
    }
}
