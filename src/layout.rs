use std::io::{self, BufWriter, Write};
use std::path::Path;

use fs_err as fs;
use packos::{Bin, Packer};
use serde::{Deserialize, Serialize};

/// The finished layout of an atlas: every page, and where each sprite sits on
/// it. This is what gets handed to whatever renders the pages and writes the
/// atlas manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AtlasLayout<T> {
    pub pages: Vec<AtlasPage<T>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AtlasPage<T> {
    pub index: usize,
    pub width: i32,
    pub height: i32,

    /// Whether this page exists only to hold one sprite that is larger than
    /// the maximum page size.
    pub oversized: bool,

    pub sprites: Vec<Sprite<T>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Sprite<T> {
    pub bin_index: usize,
    pub x: i32,
    pub y: i32,

    /// Size on the page. For rotated sprites this is the source size with
    /// width and height swapped.
    pub width: i32,
    pub height: i32,

    pub rotated: bool,
    pub data: T,
}

impl<T: Clone> AtlasLayout<T> {
    pub fn from_packer(packer: &Packer<T>) -> Self {
        let pages = packer
            .bins()
            .iter()
            .enumerate()
            .map(|(index, bin)| AtlasPage::from_bin(index, bin))
            .collect();

        Self { pages }
    }
}

impl<T> AtlasLayout<T> {
    /// Every sprite, page by page.
    pub fn sprites(&self) -> impl Iterator<Item = &Sprite<T>> {
        self.pages.iter().flat_map(|page| page.sprites.iter())
    }

    /// Pages that actually hold something. Repacking can leave a page empty,
    /// but it keeps its index so that later pages don't shift.
    pub fn used_pages(&self) -> impl Iterator<Item = &AtlasPage<T>> {
        self.pages.iter().filter(|page| !page.sprites.is_empty())
    }

    /// Logs how much of each page is covered by sprites.
    pub fn log_efficiency(&self) {
        for page in &self.pages {
            log::debug!(
                "Page {} ({}x{}{}): {} sprites, {:.1}% used",
                page.index,
                page.width,
                page.height,
                if page.oversized { ", oversized" } else { "" },
                page.sprites.len(),
                page.efficiency() * 100.0
            );
        }
    }

    pub fn write_to<W: Write>(&self, writer: W) -> io::Result<()>
    where
        T: Serialize,
    {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Writes the layout as pretty JSON, creating parent folders as needed.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()>
    where
        T: Serialize,
    {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = BufWriter::new(fs::File::create(path)?);
        self.write_to(&mut file)?;
        file.flush()?;

        log::trace!("Wrote layout of {} pages to {}", self.pages.len(), path.display());

        Ok(())
    }
}

impl<T: Clone> AtlasPage<T> {
    fn from_bin(index: usize, bin: &Bin<T>) -> Self {
        let sprites = bin
            .rects()
            .iter()
            .map(|rect| Sprite {
                bin_index: index,
                x: rect.x(),
                y: rect.y(),
                width: rect.width(),
                height: rect.height(),
                rotated: rect.is_rotated(),
                data: rect.data().clone(),
            })
            .collect();

        Self {
            index,
            width: bin.width(),
            height: bin.height(),
            oversized: bin.is_oversized(),
            sprites,
        }
    }
}

impl<T> AtlasPage<T> {
    /// The share of the page's area covered by sprites, between 0 and 1.
    pub fn efficiency(&self) -> f64 {
        let total = i64::from(self.width) * i64::from(self.height);
        if total == 0 {
            return 0.0;
        }

        let used: i64 = self
            .sprites
            .iter()
            .map(|sprite| i64::from(sprite.width) * i64::from(sprite.height))
            .sum();

        used as f64 / total as f64
    }
}
