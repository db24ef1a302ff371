use anyhow::{Context, Result};
use cammap_data::{ActionKind, ClickableRegion, ItemKind, Point};
use image::RgbaImage;
use std::io::Write;
use tracing::info;

/// The human-operator seam. The engine only calls these and branches on
/// the results; it never embeds interaction logic itself.
pub trait Annotator: Send + Sync {
    /// Points the operator indicated on the presented screen.
    fn collect_clicks(&self, image: &RgbaImage) -> Result<Vec<Point>>;
    /// Whether the proposed labels for the detected regions are right.
    fn confirm_labels(&self, image: &RgbaImage, regions: &[ClickableRegion]) -> Result<bool>;
    fn choose_item_kind(&self, candidates: &[ItemKind]) -> Result<ItemKind>;
    fn choose_action_kind(&self, candidates: &[ActionKind]) -> Result<ActionKind>;
    fn prompt_free_text(&self, prompt: &str) -> Result<String>;
}

/// Stdin-driven annotator for headless operation over a terminal.
pub struct ConsoleAnnotator;

impl ConsoleAnnotator {
    fn read_line(&self, prompt: &str) -> Result<String> {
        print!("{prompt}");
        std::io::stdout().flush().context("flushing prompt")?;
        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .context("reading operator input")?;
        Ok(line.trim().to_string())
    }
}

impl Annotator for ConsoleAnnotator {
    fn collect_clicks(&self, image: &RgbaImage) -> Result<Vec<Point>> {
        info!(
            "screen is {}x{}; enter click coordinates as `x,y`, blank line to finish",
            image.width(),
            image.height()
        );
        let mut points = Vec::new();
        loop {
            let line = self.read_line("click> ")?;
            if line.is_empty() {
                break;
            }
            let Some((x, y)) = line.split_once(',') else {
                println!("expected `x,y`");
                continue;
            };
            match (x.trim().parse(), y.trim().parse()) {
                (Ok(x), Ok(y)) => points.push(Point::new(x, y)),
                _ => println!("expected integer coordinates"),
            }
        }
        Ok(points)
    }

    fn confirm_labels(&self, _image: &RgbaImage, regions: &[ClickableRegion]) -> Result<bool> {
        for region in regions {
            println!(
                "  {} at {}",
                region.label.as_deref().unwrap_or("<unlabeled>"),
                region.bounds.centroid_key()
            );
        }
        let answer = self.read_line("accept these labels? [y/N] ")?;
        Ok(answer.eq_ignore_ascii_case("y"))
    }

    fn choose_item_kind(&self, candidates: &[ItemKind]) -> Result<ItemKind> {
        for (i, kind) in candidates.iter().enumerate() {
            println!("  {i}: {}", kind.label());
        }
        loop {
            let line = self.read_line("item kind index> ")?;
            if let Ok(index) = line.parse::<usize>() {
                if let Some(kind) = candidates.get(index) {
                    return Ok(*kind);
                }
            }
            println!("expected an index in 0..{}", candidates.len());
        }
    }

    fn choose_action_kind(&self, candidates: &[ActionKind]) -> Result<ActionKind> {
        for (i, kind) in candidates.iter().enumerate() {
            println!("  {i}: {kind:?}");
        }
        loop {
            let line = self.read_line("action kind index> ")?;
            if let Ok(index) = line.parse::<usize>() {
                if let Some(kind) = candidates.get(index) {
                    return Ok(*kind);
                }
            }
            println!("expected an index in 0..{}", candidates.len());
        }
    }

    fn prompt_free_text(&self, prompt: &str) -> Result<String> {
        self.read_line(&format!("{prompt}> "))
    }
}
