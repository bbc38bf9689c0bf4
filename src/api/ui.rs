//! UI route - single HTML page with the polling client
//!
//! Vanilla HTML/CSS/JS, no frameworks. The page searches for a song,
//! submits the chosen track, then polls job status every two seconds
//! until a terminal state; errors offer a full reset.

use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Router,
};

use crate::AppState;

/// Build UI routes
pub fn ui_routes() -> Router<AppState> {
    Router::new().route("/", get(root_page))
}

/// Root page - search, submit, poll
async fn root_page() -> impl IntoResponse {
    Html(
        r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>drumless - Drum Remover</title>
    <style>
        body {
            font-family: system-ui, -apple-system, sans-serif;
            max-width: 800px;
            margin: 40px auto;
            padding: 20px;
            line-height: 1.6;
        }
        h1 {
            color: #333;
            border-bottom: 2px solid #0066cc;
            padding-bottom: 10px;
        }
        .search-row { display: flex; gap: 10px; margin: 20px 0; }
        .search-row input {
            flex: 1; padding: 10px; font-size: 16px;
            border: 1px solid #ccc; border-radius: 4px;
        }
        .button {
            display: inline-block; padding: 10px 20px;
            background: #0066cc; color: white; border: none;
            border-radius: 4px; font-size: 16px; cursor: pointer;
        }
        .button:hover { background: #0052a3; }
        .result {
            display: flex; gap: 12px; align-items: center;
            border: 1px solid #ddd; border-radius: 4px;
            padding: 10px; margin: 8px 0; cursor: pointer;
        }
        .result:hover { background: #f0f6ff; }
        .result img { width: 80px; border-radius: 4px; }
        .result .meta { color: #666; font-size: 14px; }
        #progress-wrap {
            background: #eee; border-radius: 4px; height: 20px;
            overflow: hidden; margin: 10px 0;
        }
        #progress-bar {
            background: #0066cc; height: 100%; width: 0%;
            transition: width 0.5s;
        }
        .error { color: #b00020; margin: 10px 0; }
        .hidden { display: none; }
    </style>
</head>
<body>
    <h1>drumless</h1>
    <p>Search for a song and get it back without the drums.</p>

    <div id="search-section">
        <div class="search-row">
            <input id="query" type="text" placeholder="Song title..."
                   onkeydown="if(event.key==='Enter')doSearch()">
            <button class="button" onclick="doSearch()">Search</button>
        </div>
        <div id="results"></div>
    </div>

    <div id="job-section" class="hidden">
        <h2 id="job-title"></h2>
        <p id="job-status"></p>
        <div id="progress-wrap"><div id="progress-bar"></div></div>
        <div id="job-error" class="error hidden"></div>
        <a id="download-link" class="button hidden" download>Download instrumental</a>
        <button class="button" onclick="resetAll()">Start over</button>
    </div>

    <script>
        let pollTimer = null;

        async function doSearch() {
            const q = document.getElementById('query').value.trim();
            if (!q) return;
            const resultsEl = document.getElementById('results');
            resultsEl.textContent = 'Searching...';
            try {
                const res = await fetch('/api/search?q=' + encodeURIComponent(q));
                if (!res.ok) throw new Error('search failed');
                const data = await res.json();
                resultsEl.innerHTML = '';
                if (!data.results.length) {
                    resultsEl.textContent = 'No results.';
                    return;
                }
                for (const track of data.results) {
                    const div = document.createElement('div');
                    div.className = 'result';
                    div.innerHTML =
                        '<img src="' + track.thumbnail + '" alt="">' +
                        '<div><div>' + track.title + '</div>' +
                        '<div class="meta">' + track.channel + ' · ' + track.duration + '</div></div>';
                    div.onclick = () => submitJob(track);
                    resultsEl.appendChild(div);
                }
            } catch (e) {
                resultsEl.textContent = 'Search failed. Please try again.';
            }
        }

        async function submitJob(track) {
            const res = await fetch('/api/process', {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify({ trackId: track.id, title: track.title })
            });
            if (!res.ok) {
                alert('Could not start processing.');
                return;
            }
            const data = await res.json();
            document.getElementById('search-section').classList.add('hidden');
            document.getElementById('job-section').classList.remove('hidden');
            document.getElementById('job-title').textContent = track.title;
            pollTimer = setInterval(() => poll(data.jobId), 2000);
            poll(data.jobId);
        }

        async function poll(jobId) {
            const res = await fetch('/api/status/' + jobId);
            if (!res.ok) return;
            const job = await res.json();
            document.getElementById('job-status').textContent = 'Status: ' + job.status;
            if (job.progress !== undefined) {
                document.getElementById('progress-bar').style.width = job.progress + '%';
            }
            if (job.status === 'completed') {
                stopPolling();
                const link = document.getElementById('download-link');
                link.href = job.downloadUrl;
                link.classList.remove('hidden');
            } else if (job.status === 'failed') {
                stopPolling();
                const errEl = document.getElementById('job-error');
                errEl.textContent = job.error || 'Processing failed.';
                errEl.classList.remove('hidden');
            }
        }

        function stopPolling() {
            if (pollTimer) { clearInterval(pollTimer); pollTimer = null; }
        }

        function resetAll() {
            stopPolling();
            document.getElementById('job-section').classList.add('hidden');
            document.getElementById('search-section').classList.remove('hidden');
            document.getElementById('results').innerHTML = '';
            document.getElementById('query').value = '';
            document.getElementById('progress-bar').style.width = '0%';
            document.getElementById('job-error').classList.add('hidden');
            document.getElementById('download-link').classList.add('hidden');
        }
    </script>
</body>
</html>
"#,
    )
}
