use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};
use log::debug;

use super::identity::VoterKey;
use super::AppState;
use crate::config::Config;
use crate::error::AppError;

const LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{{title}}</title>
<style>
body { font-family: sans-serif; max-width: 720px; margin: 0 auto; padding: 20px; }
button.option { display: block; width: 100%; padding: 12px; margin: 8px 0; font-size: 16px; cursor: pointer; }
.result { border-left: 4px solid #888; padding: 8px 12px; margin: 10px 0; }
.result img { float: right; width: 64px; height: 64px; object-fit: cover; }
.votes { font-size: 1.5em; font-weight: bold; }
#message { margin-top: 16px; font-weight: bold; }
</style>
</head>
<body>
<h1>{{title}}</h1>
{{body}}
</body>
</html>
"#;

const BALLOT_SCRIPT: &str = r#"<script>
document.querySelectorAll('button.option').forEach(function (button) {
  button.addEventListener('click', function () {
    var message = document.getElementById('message');
    message.textContent = 'Submitting your vote...';
    fetch('/vote', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ option: button.dataset.option })
    })
      .then(function (response) { return response.json(); })
      .then(function (data) {
        message.textContent = data.message;
        setTimeout(function () { window.location.href = '/results'; }, data.success ? 1500 : 2000);
      })
      .catch(function () { message.textContent = 'Something went wrong.'; });
  });
});
</script>"#;

const RESULTS_SCRIPT: &str = r#"<script>
var container = document.getElementById('results');
function render(rankings) {
  container.innerHTML = '';
  rankings.forEach(function (item) {
    var card = document.createElement('div');
    card.className = 'result rank-' + item.rank;
    if (item.image) {
      var img = document.createElement('img');
      img.src = item.image;
      img.alt = 'Rank ' + item.rank;
      card.appendChild(img);
    }
    var heading = document.createElement('h3');
    heading.textContent = '#' + item.rank + ' ' + item.option;
    card.appendChild(heading);
    var votes = document.createElement('div');
    votes.className = 'votes';
    votes.textContent = item.votes + ' votes (' + item.percentage + '%)';
    card.appendChild(votes);
    container.appendChild(card);
  });
}
function refresh() {
  fetch('/api/results')
    .then(function (response) { return response.json(); })
    .then(render)
    .catch(function () { container.textContent = 'Could not load results.'; });
}
refresh();
setInterval(refresh, {{refresh_ms}});
</script>"#;

pub async fn handle_index(
    State(state): State<AppState>,
    VoterKey(voter_key): VoterKey,
) -> Result<Response, AppError> {
    if let Some(key) = voter_key.as_deref() {
        if state.ledger.has_voted(key).await? {
            debug!("{} already voted, redirecting to results", key);
            return Ok(Redirect::to("/results").into_response());
        }
    }
    Ok(Html(render_ballot(&state.config)).into_response())
}

pub async fn handle_results_page(
    State(state): State<AppState>,
    VoterKey(voter_key): VoterKey,
) -> Result<Html<String>, AppError> {
    let has_voted = match voter_key.as_deref() {
        Some(key) => state.ledger.has_voted(key).await?,
        None => false,
    };
    Ok(Html(render_results(&state.config, has_voted)))
}

pub fn render_ballot(config: &Config) -> String {
    let mut body = String::from("<p>Pick one option. Each connection can vote once.</p>\n<div id=\"ballot\">\n");
    for option in config.options.iter() {
        let option = escape_html(option);
        body.push_str(&format!(
            "<button class=\"option\" data-option=\"{}\">{}</button>\n",
            option, option
        ));
    }
    body.push_str("</div>\n<div id=\"message\"></div>\n");
    body.push_str(BALLOT_SCRIPT);
    layout(&config.title, &body)
}

pub fn render_results(config: &Config, has_voted: bool) -> String {
    let mut body = String::from("<div id=\"results\">Loading results...</div>\n");
    if has_voted {
        body.push_str("<p class=\"voted\">Your vote has been recorded. You cannot vote again.</p>\n");
    } else {
        body.push_str("<p><a href=\"/\">Cast your vote</a></p>\n");
    }
    let refresh_ms = config.refresh_secs.max(1) * 1000;
    body.push_str(&RESULTS_SCRIPT.replace("{{refresh_ms}}", &refresh_ms.to_string()));
    layout(&format!("Results - {}", config.title), &body)
}

fn layout(title: &str, body: &str) -> String {
    LAYOUT
        .replace("{{title}}", &escape_html(title))
        .replace("{{body}}", body)
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
