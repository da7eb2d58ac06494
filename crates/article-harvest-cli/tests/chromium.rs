//! Chromium surface tests. These need a local Chromium install.

use article_harvest::{ElementHandle, QueryLocator, Surface};
use article_harvest_cli::{ChromiumSurface, Settings};

const PAGE: &str = "data:text/html,<div id='list'><p class='card'>One</p><p class='card'>Two</p></div>";

#[tokio::test]
#[ignore] // Requires Chromium to be installed
async fn test_find_and_read_cards() {
    let surface = ChromiumSurface::launch(&Settings::default())
        .await
        .expect("failed to launch Chromium");

    surface.set_viewport(1024, 768).await.expect("viewport failed");
    surface.navigate(PAGE).await.expect("navigation failed");

    let list = surface
        .find(None, &QueryLocator::id("list"))
        .await
        .expect("find failed");
    assert_eq!(list.len(), 1);

    let cards = surface
        .find(Some(&list[0]), &QueryLocator::class("card"))
        .await
        .expect("scoped find failed");
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[1].text().await.expect("text failed"), "Two");

    surface.shutdown().await.expect("shutdown failed");
}

#[tokio::test]
#[ignore] // Requires Chromium to be installed
async fn test_contexts_open_switch_and_close() {
    let surface = ChromiumSurface::launch(&Settings::default())
        .await
        .expect("failed to launch Chromium");

    let primary = surface.primary_context();
    let opened = surface
        .open_context("data:text/html,<h1>Article</h1>")
        .await
        .expect("open failed");
    assert_ne!(opened, primary);
    assert_eq!(surface.current_context().await.unwrap(), primary);

    surface.switch_to(&opened).await.expect("switch failed");
    let heading = surface
        .find(None, &QueryLocator::css("h1"))
        .await
        .expect("find failed");
    assert_eq!(heading[0].text_content().await.unwrap(), "Article");

    surface.close_context(opened.clone()).await.expect("close failed");
    assert!(surface.switch_to(&opened).await.is_err());
    surface.switch_to(&primary).await.expect("switch back failed");
    assert!(surface.close_context(primary).await.is_err());

    surface.shutdown().await.expect("shutdown failed");
}
