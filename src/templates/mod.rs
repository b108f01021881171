//! Page markup for posts and the post listing
//!
//! Post pages are rendered once and cached; the listing is cheap and is
//! rendered per request from the cached post order.

use crate::content::{html_escape, Post};
use crate::feed::{join_url, path_segment};

const DISPLAY_DATE: &str = "%B %-d, %Y";

fn layout(title: &str, main: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{}</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
<header><a href="/">home</a></header>
<main>
{}
</main>
</body>
</html>
"#,
        html_escape(title),
        main
    )
}

fn tag_list(tags: &[String]) -> String {
    if tags.is_empty() {
        return String::new();
    }
    let items: String = tags
        .iter()
        .map(|t| format!("<li>{}</li>", html_escape(t)))
        .collect();
    format!(r#"<ul class="tags">{}</ul>"#, items)
}

/// Full HTML document for a single post
pub fn post_page(post: &Post) -> String {
    let mut meta = post.published_at.format(DISPLAY_DATE).to_string();
    if !post.author.is_empty() {
        meta.push_str(" · ");
        meta.push_str(&html_escape(&post.author));
    }

    let article = format!(
        r#"<article>
<h1>{}</h1>
<p class="post-meta"><time datetime="{}">{}</time></p>
{}
{}</article>"#,
        html_escape(&post.title),
        post.published_at.to_rfc3339(),
        meta,
        tag_list(&post.tags),
        post.content
    );

    layout(&post.title, &article)
}

/// Listing of all posts, newest first, linking under `posts_route`
pub fn index_page(site_title: &str, posts_route: &str, posts: &[Post]) -> String {
    let base = join_url("", posts_route);

    let list = if posts.is_empty() {
        "<p>Nothing here yet.</p>".to_string()
    } else {
        let items: String = posts
            .iter()
            .map(|post| {
                format!(
                    "<li><a href=\"{}\">{}</a> <time datetime=\"{}\">{}</time><p>{}</p></li>\n",
                    html_escape(&join_url(&base, &path_segment(&post.id))),
                    html_escape(&post.title),
                    post.published_at.to_rfc3339(),
                    post.published_at.format(DISPLAY_DATE),
                    html_escape(&post.excerpt)
                )
            })
            .collect();
        format!("<ul class=\"posts\">\n{}</ul>", items)
    };

    let main = format!(
        "<h1>{}</h1>\n<p><a href=\"{}\">rss</a></p>\n{}",
        html_escape(site_title),
        html_escape(&join_url(&base, "feed.rss")),
        list
    );

    layout(site_title, &main)
}
