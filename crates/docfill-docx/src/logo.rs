//! Logo insertion at the `[LOGO]` marker.

use std::borrow::Borrow;
use std::io::Cursor;
use std::ops::ControlFlow;
use std::path::Path;

use docfill_std::error::prelude::*;
use image::{GenericImageView, ImageFormat};

use crate::Document;
use crate::package::{part_dir, relative_target};
use crate::paragraph::{clear_runs, paragraph_text};
use crate::rels::rel_type;
use crate::story::{find_paragraph_mut, ns, w, walk_paragraphs};
use crate::xml::Element;

/// The literal text replaced by the logo.
pub const LOGO_MARKER: &str = "[LOGO]";
/// English metric units per centimetre.
pub const EMU_PER_CM: i64 = 360_000;
/// English metric units per pixel at 96 DPI.
pub const EMU_PER_PX: i64 = 9_525;
/// The largest extent a drawing may declare.
pub const MAX_EXTENT: i64 = 27_273_042_316_900;

/// Converts centimetres to English metric units.
pub fn cm_to_emu(cm: f64) -> i64 {
    (cm * EMU_PER_CM as f64).round() as i64
}

/// The display size of a drawing, in English metric units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    /// The width.
    pub cx: i64,
    /// The height.
    pub cy: i64,
}

/// A decoded logo ready to be embedded.
#[derive(Debug, Clone)]
pub struct LogoImage {
    data: Vec<u8>,
    format: ImageFormat,
    width: u32,
    height: u32,
}

impl LogoImage {
    /// Reads a logo from image bytes.
    ///
    /// PNG, JPEG and GIF are embedded as they are; any other decodable format
    /// is re-encoded to PNG.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let format = image::guess_format(&data).context_ut("unknown logo format")?;

        match format {
            ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif => {
                let (width, height) = image::ImageReader::with_format(Cursor::new(&data), format)
                    .into_dimensions()
                    .context_ut("read logo dimensions")?;
                Ok(Self {
                    data,
                    format,
                    width,
                    height,
                })
            }
            _ => {
                let img = image::load_from_memory(&data).context_ut("decode logo")?;
                let (width, height) = img.dimensions();
                let mut png = Vec::new();
                img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                    .context_ut("encode logo as png")?;
                log::debug!("re-encoded {format:?} logo as png");
                Ok(Self {
                    data: png,
                    format: ImageFormat::Png,
                    width,
                    height,
                })
            }
        }
    }

    /// Reads a logo from a file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).with_context("read logo", || {
            Some(vec![("path", path.display().to_string())].into_boxed_slice())
        })?;
        Self::from_bytes(data)
    }

    /// The embedded bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The pixel size.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The file extension of the embedded image.
    pub fn extension(&self) -> &'static str {
        match self.format {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            _ => "png",
        }
    }

    /// The content type of the embedded image.
    pub fn content_type(&self) -> &'static str {
        match self.format {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            _ => "image/png",
        }
    }

    /// The extent at the image's native size, pixels at 96 DPI.
    pub fn native_extent(&self) -> Extent {
        Extent {
            cx: i64::from(self.width) * EMU_PER_PX,
            cy: i64::from(self.height) * EMU_PER_PX,
        }
    }

    /// The extent at the given width, keeping the aspect ratio.
    pub fn extent_for_width(&self, cx: i64) -> Result<Extent> {
        if cx <= 0 || cx > MAX_EXTENT {
            bail!("logo width {cx} EMU is out of range");
        }
        if self.width == 0 || self.height == 0 {
            bail!("logo has no pixels");
        }

        let cy = (i128::from(cx) * i128::from(self.height) + i128::from(self.width) / 2)
            / i128::from(self.width);
        let cy = i64::try_from(cy)
            .ok()
            .filter(|cy| (1..=MAX_EXTENT).contains(cy));
        match cy {
            Some(cy) => Ok(Extent { cx, cy }),
            None => bail!("logo height at width {cx} EMU is out of range"),
        }
    }
}

/// How the logo is placed.
#[derive(Debug, Clone)]
pub struct LogoOptions {
    /// The marker text to look for.
    pub marker: String,
    /// The requested display width in EMU; `None` keeps the native size.
    pub width: Option<i64>,
}

impl Default for LogoOptions {
    fn default() -> Self {
        Self {
            marker: LOGO_MARKER.to_owned(),
            width: Some(5 * EMU_PER_CM),
        }
    }
}

impl Document {
    /// Replaces the first paragraph holding the marker with the logo.
    ///
    /// Stories are searched in [`Document::stories`] order. Returns `false`
    /// when no paragraph holds the marker.
    pub fn insert_logo(&mut self, logo: &LogoImage, options: &LogoOptions) -> Result<bool> {
        self.insert_logo_with(options, || Ok(logo))
    }

    /// Like [`Document::insert_logo`], but only calls `load` once a marker
    /// paragraph is found. Documents without a marker never decode the logo.
    pub fn insert_logo_with<L: Borrow<LogoImage>>(
        &mut self,
        options: &LogoOptions,
        load: impl FnOnce() -> Result<L>,
    ) -> Result<bool> {
        let marker = options.marker.as_str();
        let has_marker = |p: &Element| paragraph_text(p).contains(marker);

        let Some(story) = self.stories().into_iter().find(|story| {
            let Some(container) = self.part(&story.part).and_then(|part| part.container()) else {
                return false;
            };
            walk_paragraphs(container, &mut |p: &Element| {
                if has_marker(p) {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .is_break()
        }) else {
            log::info!("no {marker} marker found, logo not inserted");
            return Ok(false);
        };

        let logo = load()?;
        let logo: &LogoImage = logo.borrow();
        let extent = match options.width {
            Some(cx) => logo.extent_for_width(cx).unwrap_or_else(|err| {
                log::warn!("cannot size logo at requested width, using native size: {err}");
                logo.native_extent()
            }),
            None => logo.native_extent(),
        };

        let media = self.add_media(logo)?;
        let doc_pr_id = self.next_doc_pr_id();

        let part = self
            .part_mut(&story.part)
            .context("logo part disappeared")?;
        let target = relative_target(part_dir(&story.part), &media);
        let rel_id = part.rels_mut().add(rel_type::IMAGE, &target);

        let file_name = media.rsplit('/').next().unwrap_or(media.as_str());
        let run = Element::new(w::R).with_child(
            Element::new(w::DRAWING).with_child(inline_picture(&InlinePicture {
                rel_id: &rel_id,
                extent,
                doc_pr_id,
                name: file_name,
            })),
        );

        let container = part.container_mut().context("logo part has no container")?;
        let paragraph =
            find_paragraph_mut(container, &has_marker).context("logo paragraph disappeared")?;
        let at = clear_runs(paragraph);
        paragraph.children.insert(at, run.into());
        part.mark_dirty();

        log::info!(
            "inserted logo {media} into {:?} part {} ({}x{} EMU)",
            story.kind,
            story.part,
            extent.cx,
            extent.cy
        );
        Ok(true)
    }

    /// Stores the image under a fresh media name and registers its content
    /// type. Returns the part name.
    fn add_media(&mut self, logo: &LogoImage) -> Result<String> {
        let dir = part_dir(self.main_part());
        let ext = logo.extension();
        let name = (1..)
            .map(|n| match dir {
                "" => format!("media/logo{n}.{ext}"),
                dir => format!("{dir}/media/logo{n}.{ext}"),
            })
            .find(|name| !self.package.contains(name))
            .context("no free media name")?;

        self.package.put(&name, logo.data().to_vec());
        self.package
            .ensure_default_content_type(ext, logo.content_type())?;
        Ok(name)
    }

    /// The next free drawing id across the loaded parts.
    fn next_doc_pr_id(&self) -> u32 {
        let mut max = 0;
        for part in self.parts() {
            part.xml().root().for_each_element(&mut |el: &Element| {
                if el.is("wp:docPr")
                    && let Some(id) = el.attr("id").and_then(|id| id.parse::<u32>().ok())
                {
                    max = max.max(id);
                }
            });
        }
        max + 1
    }
}

struct InlinePicture<'a> {
    rel_id: &'a str,
    extent: Extent,
    doc_pr_id: u32,
    name: &'a str,
}

fn inline_picture(pic: &InlinePicture) -> Element {
    let cx = pic.extent.cx.to_string();
    let cy = pic.extent.cy.to_string();

    let graphic = Element::new("a:graphic").with_child(
        Element::new("a:graphicData")
            .with_attr("uri", ns::PIC)
            .with_child(
                Element::new("pic:pic")
                    .with_child(
                        Element::new("pic:nvPicPr")
                            .with_child(
                                Element::new("pic:cNvPr")
                                    .with_attr("id", "0")
                                    .with_attr("name", pic.name),
                            )
                            .with_child(Element::new("pic:cNvPicPr")),
                    )
                    .with_child(
                        Element::new("pic:blipFill")
                            .with_child(Element::new("a:blip").with_attr("r:embed", pic.rel_id))
                            .with_child(
                                Element::new("a:stretch").with_child(Element::new("a:fillRect")),
                            ),
                    )
                    .with_child(
                        Element::new("pic:spPr")
                            .with_child(
                                Element::new("a:xfrm")
                                    .with_child(
                                        Element::new("a:off").with_attr("x", "0").with_attr("y", "0"),
                                    )
                                    .with_child(
                                        Element::new("a:ext")
                                            .with_attr("cx", cx.as_str())
                                            .with_attr("cy", cy.as_str()),
                                    ),
                            )
                            .with_child(Element::new("a:prstGeom").with_attr("prst", "rect")),
                    ),
            ),
    );

    Element::new("wp:inline")
        .with_attr("distT", "0")
        .with_attr("distB", "0")
        .with_attr("distL", "0")
        .with_attr("distR", "0")
        .with_attr("xmlns:wp", ns::WP)
        .with_attr("xmlns:a", ns::A)
        .with_attr("xmlns:pic", ns::PIC)
        .with_attr("xmlns:r", ns::R)
        .with_child(
            Element::new("wp:extent")
                .with_attr("cx", cx.as_str())
                .with_attr("cy", cy.as_str()),
        )
        .with_child(
            Element::new("wp:docPr")
                .with_attr("id", pic.doc_pr_id.to_string())
                .with_attr("name", format!("Logo {}", pic.doc_pr_id)),
        )
        .with_child(
            Element::new("wp:cNvGraphicFramePr").with_child(
                Element::new("a:graphicFrameLocks").with_attr("noChangeAspect", "1"),
            ),
        )
        .with_child(graphic)
}
