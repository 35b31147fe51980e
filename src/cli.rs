//! CLI argument parsing and help text

pub fn wants_help(args: &[String]) -> bool {
    args.iter()
        .skip(1)
        .any(|a| a == "-h" || a == "--help" || a == "help")
}

pub fn wants_version(args: &[String]) -> bool {
    args.iter()
        .skip(1)
        .any(|a| a == "-V" || a == "--version" || a == "version")
}

pub fn print_help() {
    println!("property-search-engine");
    println!();
    println!("HTTP service for cached property search and personalized similar-property recommendations.");
    println!();
    println!("Usage:");
    println!("  property-search-engine");
    println!("  property-search-engine --help");
    println!("  property-search-engine --version");
    println!();
    println!("Required env:");
    println!("  CATALOG_DB_PATH=/path/to/catalog.db   (SQLite catalog, opened read-only)");
    println!();
    println!("Common env (defaults shown):");
    println!("  BIND_ADDR=127.0.0.1:8080");
    println!("  CORS_ENABLED=true|false              (default: true)");
    println!("  QUERY_CACHE_MAX_ENTRIES=1000");
    println!("  QUERY_CACHE_TTL_SECS=300");
    println!("  RECOMMENDATION_CACHE_MAX_ENTRIES=1000");
    println!("  RECOMMENDATION_CACHE_TTL_SECS=120");
    println!("  EVICTION_INTERVAL_SECS=60");
    println!("  SEARCH_DEFAULT_LIMIT=20 / SEARCH_MAX_LIMIT=100");
    println!("  SIMILAR_DEFAULT_LIMIT=6 / SIMILAR_MAX_LIMIT=50");
    println!("  CANDIDATE_POOL_SIZE=100");
    println!("  CANDIDATE_PRICE_BAND=0.3             (fraction of the target price)");
    println!("  SIMILARITY_WEIGHT_{{PRICE,AREA,BHK,LOCATION,CATEGORY}}=0.25,0.2,0.2,0.2,0.15");
    println!("  PERSONALIZATION_BLEND=0.4");
    println!("  DECAY_HALF_LIFE_DAYS=30");
    println!("  INTERACTION_WEIGHT_{{CONTACT,FAVORITE,VIEW,SEARCH}}=1.0,0.7,0.4,0.2");
    println!("  INTERACTION_MAX_PER_USER=100");
    println!("  INTERACTION_MAX_AGE_DAYS=90");
    println!("  METRICS_ENABLED=true|false           (default: false)");
    println!("  METRICS_PORT=9090");
    println!("  RUST_LOG=info");
    println!();
    println!("Endpoints:");
    println!("  GET    /health");
    println!("  GET    /search");
    println!("  DELETE /search/cache");
    println!("  GET    /search/analytics");
    println!("  POST   /search/analytics");
    println!("  GET    /properties/{{id}}/similar");
    println!("  POST   /properties/{{id}}/similar");
}

pub fn print_version() {
    println!("{}", env!("CARGO_PKG_VERSION"));
}
