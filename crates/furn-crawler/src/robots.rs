use reqwest::Url;
use texting_robots::Robot;

use crate::fetch::Fetcher;

/// Downloads and parses the robots.txt of the seed's origin.
///
/// Any failure means no restriction applies.
pub(crate) async fn fetch_robot(fetcher: &Fetcher, seed: &Url, user_agent: &str) -> Option<Robot> {
    let robots_url = seed.join("/robots.txt").ok()?;
    match fetcher.fetch(&robots_url).await {
        Ok(txt) => match Robot::new(user_agent, txt.as_bytes()) {
            Ok(robot) => Some(robot),
            Err(e) => {
                log::warn!("Ignoring unparsable {robots_url}: {e}");
                None
            }
        },
        Err(e) => {
            log::info!("No robots policy for {seed}: {e}");
            None
        }
    }
}
