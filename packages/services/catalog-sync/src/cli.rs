use std::path::PathBuf;

use crate::config::Config;
use crate::models::SyncProfile;

pub const DEFAULT_PRODUCTS_FILE: &str = "products_updated_prices.json";
pub const DEFAULT_CAROUSEL_FILE: &str = "carousel_data/carousel_images_with_cloudinary.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTarget {
    Products,
    Carousel,
}

impl SyncTarget {
    pub fn default_file(self) -> &'static str {
        match self {
            SyncTarget::Products => DEFAULT_PRODUCTS_FILE,
            SyncTarget::Carousel => DEFAULT_CAROUSEL_FILE,
        }
    }

    pub fn profile(self, cfg: &Config) -> SyncProfile {
        match self {
            SyncTarget::Products => cfg.products_profile(),
            SyncTarget::Carousel => cfg.carousel_profile(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Sync { target: SyncTarget, input: PathBuf },
    Help,
}

/// Parse process arguments, program name excluded. No arguments means a
/// products sync from the default file.
pub fn parse_command<I>(args: I) -> Result<Command, String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let target = match args.next().as_deref() {
        None | Some("products") => SyncTarget::Products,
        Some("carousel") => SyncTarget::Carousel,
        Some("help") | Some("--help") | Some("-h") => return Ok(Command::Help),
        Some(other) => return Err(format!("unknown command '{}'", other)),
    };
    let input = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from(target.default_file()));
    if let Some(extra) = args.next() {
        return Err(format!("unexpected argument '{}'", extra));
    }
    Ok(Command::Sync { target, input })
}

pub fn print_usage() {
    println!("Catalog sync");
    println!();
    println!("USAGE:");
    println!("  catalog-sync [products] [FILE]   Sync the product catalog (default: {})", DEFAULT_PRODUCTS_FILE);
    println!("  catalog-sync carousel [FILE]     Sync carousel images (default: {})", DEFAULT_CAROUSEL_FILE);
    println!("  catalog-sync help                Show this message");
    println!();
    println!("ENVIRONMENT:");
    println!("  MONGODB_URI, DATABASE_NAME, MONGODB_RETRY_WRITES");
    println!("  EMBEDDINGS_SERVICE_URL, EMBEDDING_DIMENSION, HTTP_TIMEOUT_MS, EMBEDDING_PARALLELISM");
    println!("  PRODUCT_BATCH_SIZE, CAROUSEL_BATCH_SIZE, PRODUCTS_COLLECTION, CAROUSEL_COLLECTION");
    println!("  RECORD_CHANNEL_CAPACITY, RUST_LOG");
    println!();
    println!("Ctrl-C stops reading, flushes buffered writes and skips soft-delete and index maintenance.");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_arguments_syncs_products_from_default_file() {
        assert_eq!(
            parse_command(args(&[])).unwrap(),
            Command::Sync { target: SyncTarget::Products, input: PathBuf::from(DEFAULT_PRODUCTS_FILE) }
        );
    }

    #[test]
    fn carousel_with_explicit_file() {
        assert_eq!(
            parse_command(args(&["carousel", "/tmp/slides.json"])).unwrap(),
            Command::Sync { target: SyncTarget::Carousel, input: PathBuf::from("/tmp/slides.json") }
        );
    }

    #[test]
    fn help_and_unknown_commands() {
        assert_eq!(parse_command(args(&["--help"])).unwrap(), Command::Help);
        assert!(parse_command(args(&["migrate"])).is_err());
        assert!(parse_command(args(&["products", "a.json", "b.json"])).is_err());
    }
}
