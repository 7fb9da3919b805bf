//! Registry HTTP client: lists repositories/tags, reads manifests, and
//! selects which tags are stale by regex/semver/count.
//!
//! This is the "external collaborator" the collector spec treats as a
//! contract only: it decides *which* `(repository, tag)` pairs are garbage,
//! then invokes the on-disk collector once per tag to actually reclaim the
//! bytes. It never talks to the registry's delete API itself — deletion is
//! the collector's job, and the registry is assumed quiesced while this
//! runs, same as `registry-gc`.

use std::{collections::HashMap, error::Error, num::NonZeroUsize, path::PathBuf};

use clap::Parser;
use regex::Regex;
use reqwest::{
    Client, StatusCode, Url,
    header::{ACCEPT, HeaderMap, HeaderValue},
};
use semver::Version;
use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use registry_gc::{Collector, DEFAULT_DATA_DIR, Store};

pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    repositories: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageTagList {
    tags: Vec<String>,
}

/// Select stale tags from a registry and reclaim them via the on-disk
/// collector. Run this on the registry host with the registry quiesced.
#[derive(Debug, Clone, Parser)]
#[command(version)]
pub struct Args {
    /// The base URL of the container registry. e.g. https://docker.io/
    #[arg(short, long)]
    registry_url: Url,
    /// Optional username to use when logging in to the registry.
    #[arg(long)]
    registry_user: Option<String>,
    /// Optional password to use when logging in to the registry.
    #[arg(long)]
    registry_password: Option<String>,
    /// Maximum number of images to keep per tag and regex pattern
    #[arg(short, long)]
    max_per_tag: NonZeroUsize,
    /// Regex for tag whitelist, multiple can be specified if any match
    /// then it's in whitelist. If none, no action is taken. The
    /// max_per_tag is applied per pattern here.
    #[arg(short, long)]
    tags: Vec<String>,
    /// Regex for image whitelist, multiple can be specified if any of them
    /// match then it's in whitelist. If none all images are whitelisted
    #[arg(short, long)]
    images: Vec<String>,
    /// Should the tags be sorted by semver?
    #[arg(short, long)]
    semver: bool,
    /// Reclaim disk space for the tags selected for deletion, via the
    /// on-disk collector. Otherwise it's dry-run by default.
    #[arg(short, long)]
    delete: bool,
}

/// Returns the pair of (tags_to_keep, tags_to_remove). Sorts in descending
/// order; if semver is true, uses semantic versioning to order tags,
/// otherwise lexicographically.
pub fn classify_tags(
    tags: Vec<String>,
    num_tags: usize,
    semver: bool,
) -> (Vec<String>, Vec<String>) {
    let n = num_tags.min(tags.len());

    let sorted = if semver {
        let mut versions: Vec<(Version, String)> = tags
            .into_iter()
            .filter_map(|tag| {
                let vstr = tag.trim_start_matches('v');
                Version::parse(vstr).ok().map(|ver| (ver, tag))
            })
            .collect();

        versions.sort_unstable_by(|(a, _), (b, _)| b.cmp(a));
        versions.into_iter().map(|v| v.1).collect()
    } else {
        let mut tags = tags;
        tags.sort_unstable_by(|a, b| b.cmp(a));
        tags
    };

    let tags_to_keep = sorted[..n].to_vec();
    let tags_to_remove = sorted[n..].to_vec();

    (tags_to_keep, tags_to_remove)
}

/// Sort all of the given tags into a hashmap based on the provided regex.
pub fn get_matching_tags(
    tag_list: &ImageTagList,
    regex_tags: &[(String, Regex)],
) -> HashMap<String, Vec<String>> {
    let mut matching_tags: HashMap<String, Vec<String>> = HashMap::new();

    if regex_tags.is_empty() {
        matching_tags.insert(String::from(".*"), tag_list.tags.clone());
    } else {
        for tag in tag_list.tags.iter() {
            for regex_tag in regex_tags.iter() {
                if regex_tag.1.is_match(tag) {
                    let entry = matching_tags.entry(regex_tag.0.clone()).or_default();
                    entry.push(tag.clone());
                }
            }
        }
    }

    matching_tags
}

pub async fn get_catalog(
    client: &Client,
    registry_url: &Url,
    headers: &HeaderMap,
    auth: Option<&(String, Option<String>)>,
) -> Result<Catalog, BoxError> {
    let mut request = client
        .get(registry_url.join("/v2/_catalog")?)
        .headers(headers.clone());

    if let Some(auth) = auth {
        request = request.basic_auth(&auth.0, auth.1.as_ref());
    }

    let response = request.send().await?.error_for_status()?;
    Ok(response.json().await?)
}

pub async fn get_tag_list(
    client: &Client,
    registry_url: &Url,
    headers: &HeaderMap,
    auth: Option<&(String, Option<String>)>,
    repository: &str,
) -> Result<ImageTagList, BoxError> {
    let mut request = client
        .get(registry_url.join(&format!("/v2/{repository}/tags/list"))?)
        .headers(headers.clone());

    if let Some(auth) = auth {
        request = request.basic_auth(&auth.0, auth.1.as_ref());
    }

    let response = request.send().await?.error_for_status()?;
    Ok(response.json().await?)
}

pub async fn tag_exists(
    client: &Client,
    registry_url: &Url,
    headers: &HeaderMap,
    auth: Option<&(String, Option<String>)>,
    repository: &str,
    tag: &str,
) -> Result<bool, BoxError> {
    let mut request = client
        .head(registry_url.join(&format!("/v2/{repository}/manifests/{tag}"))?)
        .headers(headers.clone());

    if let Some(auth) = auth {
        request = request.basic_auth(&auth.0, auth.1.as_ref());
    }

    let response = request.send().await?;
    if response.status() == StatusCode::NOT_FOUND {
        return Ok(false);
    }
    response.error_for_status()?;
    Ok(true)
}

/// Invoke the on-disk collector for a single `(repository, tag)` pair.
/// Filesystem work is synchronous, so it runs on the blocking pool.
async fn reclaim_tag(data_dir: PathBuf, dry_run: bool, repository: String, tag: String) -> Result<(), BoxError> {
    tokio::task::spawn_blocking(move || {
        let store = Store::new(data_dir, dry_run);
        let collector = Collector::new(store);
        collector.delete_tag(&repository, &tag)
    })
    .await??;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let headers = HeaderMap::from_iter([(
        ACCEPT,
        HeaderValue::from_static(
            "application/json,application/vnd.docker.distribution.manifest.v2+json,application/vnd.oci.image.manifest.v1+json",
        ),
    )]);

    let auth = args
        .registry_user
        .clone()
        .map(|username| (username, args.registry_password.clone()));

    let regex_tags: Result<Vec<(String, Regex)>, regex::Error> = args
        .tags
        .iter()
        .map(|t| Regex::new(t).map(|r| (t.clone(), r)))
        .collect();
    let regex_tags = regex_tags.map_err(|e| format!("invalid tag regex: {e}"))?;

    let regex_images: Result<Vec<(String, Regex)>, regex::Error> = args
        .images
        .iter()
        .map(|t| Regex::new(t).map(|r| (t.clone(), r)))
        .collect();
    let regex_images = regex_images.map_err(|e| format!("invalid image regex: {e}"))?;

    let data_dir: PathBuf =
        std::env::var("REGISTRY_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.into());

    let client = Client::new();
    let catalog = get_catalog(&client, &args.registry_url, &headers, auth.as_ref()).await?;

    let mut join_set: JoinSet<Result<(String, usize), BoxError>> = JoinSet::new();

    for repository in catalog.repositories {
        if !regex_images.is_empty() && !regex_images.iter().any(|(_, re)| re.is_match(&repository))
        {
            info!(repository = repository.as_str(), "image doesn't match any of the images specified, skipping");
            continue;
        }

        let client = client.clone();
        let registry_url = args.registry_url.clone();
        let headers = headers.clone();
        let auth = auth.clone();
        let regex_tags = regex_tags.clone();
        let data_dir = data_dir.clone();
        let delete = args.delete;
        let max_per_tag = args.max_per_tag;
        let semver = args.semver;

        join_set.spawn(async move {
            let tag_list =
                get_tag_list(&client, &registry_url, &headers, auth.as_ref(), &repository).await?;
            let matching_tags = get_matching_tags(&tag_list, &regex_tags);

            let mut reclaimed = 0usize;

            if matching_tags.is_empty() {
                info!(repository = repository.as_str(), "no tags eligible for deletion found");
                return Ok((repository, reclaimed));
            }

            for (pattern, tags) in matching_tags {
                let (_keep, to_remove) = classify_tags(tags, max_per_tag.into(), semver);
                if to_remove.is_empty() {
                    continue;
                }

                info!(
                    repository = repository.as_str(),
                    pattern = pattern.as_str(),
                    count = to_remove.len(),
                    "found tags eligible for deletion"
                );

                for tag in to_remove {
                    let exists = tag_exists(
                        &client,
                        &registry_url,
                        &headers,
                        auth.as_ref(),
                        &repository,
                        &tag,
                    )
                    .await?;

                    if !exists {
                        warn!(repository = repository.as_str(), tag = tag.as_str(), "couldn't find tag on registry");
                        continue;
                    }

                    if delete {
                        reclaim_tag(data_dir.clone(), false, repository.clone(), tag.clone()).await?;
                        info!(repository = repository.as_str(), tag = tag.as_str(), "reclaimed tag");
                    } else {
                        reclaim_tag(data_dir.clone(), true, repository.clone(), tag.clone()).await?;
                        info!(repository = repository.as_str(), tag = tag.as_str(), "would reclaim tag (dry run)");
                    }
                    reclaimed += 1;
                }
            }

            Ok((repository, reclaimed))
        });
    }

    let mut total_reclaimed = 0usize;
    let mut errors = Vec::new();

    while let Some(result) = join_set.join_next().await {
        match result? {
            Ok((_repository, n)) => total_reclaimed += n,
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        warn!(
            "{} error(s) occurred during processing:\n\t{}",
            errors.len(),
            errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n\t")
        );
    }

    if args.delete {
        info!("reclaimed a total of {total_reclaimed} tag(s)");
    } else {
        info!("found a total of {total_reclaimed} tag(s) to reclaim");
        info!("delete flag (-d/--delete) not specified, none of the above have actually been deleted");
    }

    Ok(())
}
