use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use scraper::Html;
use serde::Serialize;

use crate::cli::{InspectArgs, RunArgs};
use crate::fetch::{FetchError, PageFetcher};
use crate::gold::{self, GoldStandardRecord};
use crate::model::{ChatModel, ModelClient, RetryPolicy};
use crate::openai::OpenAiChat;
use crate::passage::Passage;
use crate::report::{OutputRecord, ResultTable};
use crate::score::score;
use crate::throttle::{RateLimiter, RateLimits, SystemClock};

/// Everything taken from one fetch of a page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageExtract {
    pub passage: Passage,
    /// `None` when the fetch failed or the passage was not found.
    pub gold: Option<GoldStandardRecord>,
}

impl PageExtract {
    pub fn from_fetch(fetched: Result<String, FetchError>) -> Self {
        match fetched {
            Ok(markup) => {
                let document = Html::parse_document(&markup);
                let passage = Passage::from_document(&document);
                let gold = (!passage.skips_analysis())
                    .then(|| GoldStandardRecord::from_document(&document));
                Self { passage, gold }
            }
            Err(err) => Self {
                passage: Passage::FetchFailed(err),
                gold: None,
            },
        }
    }
}

/// Analyzes and scores one page. Pages without a title/body get a row with
/// only the URL and passage filled in.
pub async fn evaluate<M: ChatModel>(
    client: &ModelClient<M>,
    limiter: &mut RateLimiter,
    url: &str,
    page: PageExtract,
) -> anyhow::Result<OutputRecord> {
    let extracted_text = page.passage.to_string();
    if page.passage.skips_analysis() {
        tracing::info!(url, "title or body not found; skipping analysis");
        return Ok(OutputRecord::skipped(url, extracted_text));
    }

    let answer = client.analyze(limiter, &extracted_text).await;
    let gold_json = gold::to_pretty_json(page.gold.as_ref())?;
    let triple = score(
        &answer,
        page.gold.iter().flat_map(GoldStandardRecord::values),
    );
    tracing::info!(
        url,
        accuracy = triple.accuracy,
        precision = triple.precision,
        recall = triple.recall,
        "scored"
    );

    Ok(OutputRecord::scored(
        url,
        extracted_text,
        answer,
        gold_json,
        triple,
    ))
}

/// Runs every URL in order, appending one row per URL.
pub async fn process_urls<M: ChatModel>(
    urls: &[String],
    fetcher: &PageFetcher,
    client: &ModelClient<M>,
    limiter: &mut RateLimiter,
    table: &mut ResultTable,
) -> anyhow::Result<()> {
    let total = urls.len();
    for (index, url) in urls.iter().enumerate() {
        tracing::info!(index = index + 1, total, url = %url, "processing url");

        let page = PageExtract::from_fetch(fetcher.fetch(url).await);
        if let Passage::FetchFailed(err) = &page.passage {
            tracing::warn!(url = %url, error = %err, "page fetch failed");
        }

        let record = evaluate(client, limiter, url, page).await?;
        table
            .append(&record)
            .with_context(|| format!("append result for {url}"))?;
    }
    Ok(())
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let urls = read_url_list(Path::new(&args.urls))?;
    let fetcher = PageFetcher::new(args.fetch_timeout_secs.map(Duration::from_secs))?;
    let model = OpenAiChat::from_env(&args.openai_base_url)?;
    let client = ModelClient::new(model, args.model.as_str(), RetryPolicy::DEFAULT);
    let mut limiter = RateLimiter::new(RateLimits::DEFAULT, Arc::new(SystemClock));
    let mut table = ResultTable::open(&args.out);

    tracing::info!(
        urls = urls.len(),
        out = %args.out,
        model = %args.model,
        new_table = table.writes_header(),
        "starting batch"
    );

    process_urls(&urls, &fetcher, &client, &mut limiter, &mut table).await?;

    println!("Analysis results saved in {}", table.path().display());
    Ok(())
}

#[derive(Debug, Serialize)]
struct InspectOutput {
    url: String,
    passage: String,
    gold_standard: Option<GoldStandardRecord>,
}

/// Prints what `run` would send to the model and score against, without calling it.
pub async fn inspect(args: InspectArgs) -> anyhow::Result<()> {
    let fetcher = PageFetcher::new(args.fetch_timeout_secs.map(Duration::from_secs))?;
    let output = match fetcher.fetch(&args.url).await {
        Ok(markup) => {
            let document = Html::parse_document(&markup);
            InspectOutput {
                url: args.url.clone(),
                passage: Passage::from_document(&document).to_string(),
                gold_standard: Some(GoldStandardRecord::from_document(&document)),
            }
        }
        Err(err) => InspectOutput {
            url: args.url.clone(),
            passage: Passage::FetchFailed(err).to_string(),
            gold_standard: None,
        },
    };

    let json = serde_json::to_string_pretty(&output).context("serialize inspect output")?;
    println!("{json}");
    Ok(())
}

/// One URL per line, trimmed. Blank lines are skipped.
pub fn read_url_list(path: &Path) -> anyhow::Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("read url list: {}", path.display()))?;
    let urls = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect::<Vec<_>>();
    tracing::debug!(path = %path.display(), urls = urls.len(), "read url list");
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gold::NOT_AVAILABLE;
    use crate::model::tests::ScriptedModel;
    use crate::throttle::ManualClock;

    const EVENT_PAGE: &str = r#"<html><body>
        <h1 class="title">Hearing the Proms</h1>
        <div class="lessme">I heard Elgar conducted live in London.</div>
        <span property="http://led.kmi.open.ac.uk/term/has_medium">Live</span>
        <span style="font-size:1.2em"><a href="/place/london">London</a></span>
    </body></html>"#;

    fn client(replies: Vec<Result<String, crate::model::ModelError>>) -> ModelClient<ScriptedModel> {
        ModelClient::new(ScriptedModel::new(replies), "gpt-4", RetryPolicy::DEFAULT)
    }

    fn limiter() -> RateLimiter {
        RateLimiter::new(
            RateLimits::DEFAULT,
            Arc::new(ManualClock::starting_at(Duration::from_secs(60))),
        )
    }

    #[test]
    fn fetched_page_yields_passage_and_gold() {
        let page = PageExtract::from_fetch(Ok(EVENT_PAGE.to_owned()));
        assert_eq!(
            page.passage,
            Passage::Text("Hearing the Proms. I heard Elgar conducted live in London.".to_owned())
        );
        let gold = page.gold.expect("gold record");
        assert_eq!(gold.medium, "Live");
        assert_eq!(gold.location, "London");
        assert_eq!(gold.listener, NOT_AVAILABLE);
    }

    #[test]
    fn page_without_passage_has_no_gold() {
        let page = PageExtract::from_fetch(Ok("<html><body>empty</body></html>".to_owned()));
        assert_eq!(page.passage, Passage::ElementsNotFound);
        assert_eq!(page.gold, None);
    }

    #[tokio::test]
    async fn skipped_page_makes_no_model_call() -> anyhow::Result<()> {
        let client = client(vec![Ok("unused".to_owned())]);
        let mut limiter = limiter();
        let page = PageExtract::from_fetch(Ok("<p>no title</p>".to_owned()));

        let record = evaluate(&client, &mut limiter, "http://example.com/x", page).await?;

        assert!(client.model().requests().is_empty());
        assert_eq!(
            record,
            OutputRecord::skipped(
                "http://example.com/x",
                "Elements not found on the page.".to_owned()
            )
        );
        Ok(())
    }

    #[tokio::test]
    async fn analyzed_page_is_scored_against_gold() -> anyhow::Result<()> {
        let client = client(vec![Ok("Medium: Live Location: London".to_owned())]);
        let mut limiter = limiter();
        let page = PageExtract::from_fetch(Ok(EVENT_PAGE.to_owned()));

        let record = evaluate(&client, &mut limiter, "http://example.com/e", page).await?;

        let requests = client.model().requests();
        assert_eq!(requests.len(), 1);
        assert!(
            requests[0].messages[2]
                .content
                .ends_with("Hearing the Proms. I heard Elgar conducted live in London.")
        );
        assert_eq!(
            record.analysis_result.as_deref(),
            Some("Medium: Live Location: London")
        );
        // tokens {Medium:, Live, Location:, London}; gold {Not Available, Live, London}
        assert_eq!(record.precision, Some(0.5));
        assert_eq!(record.recall, Some(2.0 / 3.0));
        assert_eq!(record.accuracy, Some(2.0 / 5.0));
        assert!(
            record
                .gold_standard
                .as_deref()
                .is_some_and(|json| json.starts_with("{\n    \"Listener\": \"Not Available\""))
        );
        Ok(())
    }

    #[tokio::test]
    async fn failed_fetch_is_still_analyzed_with_empty_gold() -> anyhow::Result<()> {
        let client = client(vec![Ok("nothing to say".to_owned())]);
        let mut limiter = limiter();
        let page = PageExtract::from_fetch(Err(FetchError::Status(404)));

        let record = evaluate(&client, &mut limiter, "http://example.com/gone", page).await?;

        assert_eq!(record.extracted_text, "Failed to retrieve the web page.");
        assert_eq!(record.gold_standard.as_deref(), Some("{}"));
        assert_eq!(record.accuracy, Some(0.0));
        assert_eq!(client.model().requests().len(), 1);
        Ok(())
    }

    #[test]
    fn url_list_is_trimmed_and_skips_blank_lines() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let path = temp.path().join("urls.txt");
        std::fs::write(
            &path,
            "  http://example.com/a \n\nhttp://example.com/a\r\nhttp://example.com/b%20c\n",
        )?;

        assert_eq!(
            read_url_list(&path)?,
            [
                "http://example.com/a",
                "http://example.com/a",
                "http://example.com/b%20c"
            ]
        );
        Ok(())
    }
}
