use goose::prelude::*;
use rand::Rng;

/// Load testing suite for the pixelproxy edge image proxy.
///
/// Simulates a mix of:
/// - WebP-capable clients with varied resize parameters (cache misses)
/// - Repeated identical requests (cache hits)
/// - Legacy clients without WebP support (separate cache variant)
/// - Health monitoring endpoints
///
/// # Usage
/// ```bash
/// cd loadtest
/// cargo run --release -- --host http://localhost:8080 --users 10 --hatch-rate 2 --run-time 60s
/// ```

const ORIGIN_IMAGE: &str = "/picsum.photos/id/237/2000/2000.jpg";

#[tokio::main]
async fn main() -> Result<(), GooseError> {
    GooseAttack::initialize()?
        .register_scenario(
            scenario!("ImageNegotiation")
                .register_transaction(transaction!(webp_resize).set_weight(10)?)
                .register_transaction(transaction!(legacy_client).set_weight(3)?)
                .register_transaction(transaction!(health_check).set_weight(1)?)
        )
        .register_scenario(
            scenario!("CachePerformance")
                // Consistent parameters validate cache hit performance
                .register_transaction(transaction!(cached_image).set_weight(15)?)
                // Unique parameters validate transformation throughput
                .register_transaction(transaction!(uncached_image).set_weight(5)?)
        )
        .execute()
        .await?;

    Ok(())
}

async fn get_with_accept(user: &mut GooseUser, path: &str, accept: &str) -> TransactionResult {
    let builder = user
        .get_request_builder(&GooseMethod::Get, path)?
        .header("Accept", accept);
    let request = GooseRequest::builder().set_request_builder(builder).build();
    let _goose = user.request(request).await?;
    Ok(())
}

/// Randomized resize for a WebP-capable browser.
async fn webp_resize(user: &mut GooseUser) -> TransactionResult {
    // Generate random parameters before await to satisfy Send bounds
    let path = {
        let mut rng = rand::thread_rng();
        format!("{}?w={}&q={}", ORIGIN_IMAGE, rng.gen_range(100..1000), rng.gen_range(40..95))
    };
    get_with_accept(user, &path, "image/avif,image/webp,*/*").await
}

/// Client without WebP support; exercises the same-format resize path.
async fn legacy_client(user: &mut GooseUser) -> TransactionResult {
    let path = {
        let mut rng = rand::thread_rng();
        format!("{}?h={}", ORIGIN_IMAGE, rng.gen_range(100..1000))
    };
    get_with_accept(user, &path, "image/jpeg,*/*").await
}

/// Fixed parameters guarantee cache hits after warmup.
async fn cached_image(user: &mut GooseUser) -> TransactionResult {
    let path = format!("{}?w=500", ORIGIN_IMAGE);
    get_with_accept(user, &path, "image/webp").await
}

/// Wall-clock derived widths keep the cache key unique.
async fn uncached_image(user: &mut GooseUser) -> TransactionResult {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    let path = format!("{}?w={}", ORIGIN_IMAGE, 200 + nanos % 1800);
    get_with_accept(user, &path, "image/webp").await
}

async fn health_check(user: &mut GooseUser) -> TransactionResult {
    let _goose = user.get("/health").await?;
    Ok(())
}
