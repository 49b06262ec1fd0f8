/// Archive of the 2010-01-21 Haiti orthoimagery, one folder per image type
pub const DEFAULT_IMAGERY_BASE_URL: &str = "ftp://dirsftp.cis.rit.edu/Haiti/2010-01-21-haiti/";

/// Timeout applied to every imagery download
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 600;
