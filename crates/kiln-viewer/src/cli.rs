use std::path::PathBuf;

use clap::Parser;

use kiln_engine::config::RendererConfig;
use kiln_engine::device::GpuInit;
use kiln_engine::logging::LoggingConfig;
use kiln_engine::shader::ShaderVariant;
use kiln_engine::transform::DEFAULT_TRANSFORM_TABLE_CAPACITY;

#[derive(Debug, Parser)]
#[command(
    name = "kiln-viewer",
    about = "Draws atlas-textured, lit meshes through the kiln batcher"
)]
pub struct Cli {
    #[arg(long, default_value = "kiln viewer")]
    title: String,

    #[arg(long, default_value_t = 640)]
    width: u32,

    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Atlas descriptor JSON. Without it a generated two-image atlas is used.
    #[arg(long)]
    atlas: Option<PathBuf>,

    /// Atlas page image, in atlas-index order. Repeat once per page.
    #[arg(long = "page")]
    pages: Vec<PathBuf>,

    /// Source image id used by the body and floor meshes.
    #[arg(long, default_value = "checker")]
    body_image: String,

    /// Source image id used by the light marker.
    #[arg(long, default_value = "glow")]
    marker_image: String,

    /// Transform-table slots.
    #[arg(long, default_value_t = DEFAULT_TRANSFORM_TABLE_CAPACITY)]
    transform_slots: usize,

    /// Draw everything with the unlit variant only.
    #[arg(long)]
    unlit: bool,

    /// `env_logger` filter, e.g. "kiln_engine=debug".
    #[arg(long)]
    log_filter: Option<String>,

    /// Also append log output to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Atlas files supplied on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasSource {
    pub descriptor: PathBuf,
    pub pages: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub title: String,
    pub size: (u32, u32),
    pub atlas: Option<AtlasSource>,
    pub body_image: String,
    pub marker_image: String,
    pub renderer: RendererConfig,
    pub logging: LoggingConfig,
    pub gpu: GpuInit,
}

impl Cli {
    pub fn into_config(self) -> anyhow::Result<ViewerConfig> {
        anyhow::ensure!(
            self.width > 0 && self.height > 0,
            "window size must be non-zero, got {}x{}",
            self.width,
            self.height
        );

        let atlas = match self.atlas {
            Some(descriptor) => {
                anyhow::ensure!(
                    !self.pages.is_empty(),
                    "--atlas needs at least one --page image"
                );
                Some(AtlasSource {
                    descriptor,
                    pages: self.pages,
                })
            }
            None => {
                anyhow::ensure!(self.pages.is_empty(), "--page given without --atlas");
                None
            }
        };

        let variants = if self.unlit {
            vec![ShaderVariant::AtlasTransformTable]
        } else {
            vec![
                ShaderVariant::AtlasTransformTableAmbientDiffuse,
                ShaderVariant::AtlasTransformTable,
            ]
        };

        Ok(ViewerConfig {
            title: self.title,
            size: (self.width, self.height),
            atlas,
            body_image: self.body_image,
            marker_image: self.marker_image,
            renderer: RendererConfig {
                variants,
                transform_table_capacity: self.transform_slots,
                ..RendererConfig::default()
            },
            logging: LoggingConfig {
                env_filter: self.log_filter,
                log_file: self.log_file,
                ..LoggingConfig::default()
            },
            gpu: GpuInit::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<ViewerConfig> {
        let argv = std::iter::once("kiln-viewer").chain(args.iter().copied());
        Cli::try_parse_from(argv)?.into_config()
    }

    #[test]
    fn defaults_use_generated_atlas_and_both_variants() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.size, (640, 480));
        assert!(config.atlas.is_none());
        assert_eq!(config.renderer.variants.len(), 2);
        assert_eq!(
            config.renderer.transform_table_capacity,
            DEFAULT_TRANSFORM_TABLE_CAPACITY
        );
    }

    #[test]
    fn atlas_with_pages() {
        let config = parse(&["--atlas", "a.json", "--page", "a_0.png", "--page", "a_1.png"]).unwrap();
        assert_eq!(
            config.atlas,
            Some(AtlasSource {
                descriptor: "a.json".into(),
                pages: vec!["a_0.png".into(), "a_1.png".into()],
            })
        );
    }

    #[test]
    fn atlas_without_pages_is_rejected() {
        assert!(parse(&["--atlas", "a.json"]).is_err());
    }

    #[test]
    fn pages_without_atlas_are_rejected() {
        assert!(parse(&["--page", "a_0.png"]).is_err());
    }

    #[test]
    fn unlit_requests_single_variant() {
        let config = parse(&["--unlit"]).unwrap();
        assert_eq!(config.renderer.variants, vec![ShaderVariant::AtlasTransformTable]);
    }

    #[test]
    fn logging_options_are_forwarded() {
        let config = parse(&["--log-filter", "debug", "--log-file", "kiln.log"]).unwrap();
        assert_eq!(config.logging.env_filter.as_deref(), Some("debug"));
        assert_eq!(config.logging.log_file, Some(PathBuf::from("kiln.log")));
    }
}
