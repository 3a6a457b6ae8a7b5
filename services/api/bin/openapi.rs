//! Writes the TrialMatch API's OpenAPI document (`/api/voice-token`, `/health`)
//! to `openapi.json` in the working directory, for client generation and review.

use trialmatch_api::router::ApiDoc;
use utoipa::OpenApi;

const OUTPUT_PATH: &str = "openapi.json";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let spec_json = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(OUTPUT_PATH, spec_json)?;
    println!("Wrote OpenAPI document to {OUTPUT_PATH}");
    Ok(())
}
