/// Constants module to avoid magic numbers in the codebase

// Remote store layout
pub const CACHE_COLLECTION: &str = "analysis_cache";
pub const CONVERSATIONS_COLLECTION: &str = "conversations";
pub const REPORTS_COLLECTION: &str = "analysis_results";
pub const CONSOLIDATED_REPORT_KEY: &str = "consolidated";
pub const AUTH_QUERY_PARAM: &str = "auth";

// Optimistic concurrency on the cache document
pub const ETAG_REQUEST_HEADER: &str = "X-Firebase-ETag";
pub const CACHE_WRITE_MAX_ATTEMPTS: usize = 3;

// Timeouts
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const ANALYZER_REQUEST_TIMEOUT_SECS: u64 = 600; // 10 minutes for large model requests

// Analysis
pub const DEFAULT_ANALYSIS_CONCURRENCY: usize = 1;
pub const DEFAULT_ANALYZER_ENDPOINT: &str = "http://localhost:4000/v1";
pub const DEFAULT_ANALYZER_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_ANALYZER_API_KEY_ENV: &str = "CONVOLENS_ANALYZER_KEY";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const FINGERPRINT_BYTES: usize = 16; // 128-bit fingerprint

// Reporting
pub const REPORT_TOP_TAGS: usize = 10;

// Environment
pub const ENV_PREFIX: &str = "CONVOLENS_";
pub const TENANT_ENV: &str = "CONVOLENS_TENANT";
