// Server-rendered HTML. The page works without JavaScript (plain form post to
// /download); with JavaScript it switches to the JSON API and polls progress.

use std::path::Path;
use crate::downloader::{MediaType, Quality};
use crate::utils::escape_html;

/// Values to put back into the form when it is re-rendered.
#[derive(Debug, Clone, Default)]
pub struct FormValues {
    pub url: String,
    pub media_type: String,
    pub quality: String,
}

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>ytdl-web</title>
<style>
  body { font-family: system-ui, sans-serif; background: #f4f5f7; margin: 0; }
  main { max-width: 640px; margin: 48px auto; background: #fff; padding: 32px; border-radius: 12px; box-shadow: 0 4px 20px rgba(0,0,0,.08); }
  h1 { margin-top: 0; }
  label { display: block; font-weight: 600; margin: 16px 0 6px; }
  input[type=url], select { width: 100%; padding: 10px; font-size: 1rem; box-sizing: border-box; }
  .types label { display: inline; font-weight: normal; margin-right: 16px; }
  button { margin-top: 20px; padding: 10px 20px; font-size: 1rem; cursor: pointer; }
  .notice { padding: 12px; border-radius: 8px; margin-bottom: 16px; white-space: pre-wrap; }
  .notice.error { background: #fde8e8; color: #8a1c1c; }
  .hint { color: #666; font-size: .9rem; }
  #progress { display: none; margin-top: 20px; }
  #bar { height: 14px; background: #e5e7eb; border-radius: 7px; overflow: hidden; }
  #fill { height: 100%; width: 0; background: #3b82f6; transition: width .3s; }
  #info { display: none; margin-top: 16px; font-size: .95rem; }
  #recent { display: none; margin-top: 24px; }
  #recent ul { list-style: none; padding: 0; margin: 0; }
  #recent li { display: flex; justify-content: space-between; gap: 12px; padding: 8px 0; border-top: 1px solid #eee; font-size: .9rem; }
  #recent .meta { color: #666; font-size: .8rem; }
  .state-downloading { color: #1d4ed8; }
  .state-completed { color: #1c5c2e; }
  .state-error { color: #8a1c1c; }
</style>
</head>
<body>
<main>
  <h1>ytdl-web</h1>
  __NOTICE__
  <form id="form" method="post" action="/download">
    <label for="url">Video URL</label>
    <input type="url" id="url" name="url" required placeholder="https://www.youtube.com/watch?v=..." value="__URL__">

    <label>Type</label>
    <div class="types">
      <label><input type="radio" name="media_type" value="video" __VIDEO_CHECKED__> Video</label>
      <label><input type="radio" name="media_type" value="audio" __AUDIO_CHECKED__> Audio (MP3)</label>
    </div>

    <label for="quality">Quality</label>
    <select id="quality" name="quality">
      <optgroup label="Video" data-type="video">
__VIDEO_OPTIONS__
      </optgroup>
      <optgroup label="Audio" data-type="audio">
__AUDIO_OPTIONS__
      </optgroup>
    </select>

    <button type="button" id="info-btn">Show info</button>
    <button type="submit" id="submit-btn">Download</button>
  </form>
  <p class="hint">Files are saved to <code>__DOWNLOAD_PATH__</code> on the server.</p>

  <div id="info"></div>
  <div id="progress">
    <div id="bar"><div id="fill"></div></div>
    <p id="progress-text">Preparing download...</p>
  </div>
  <section id="recent">
    <h2>Recent downloads</h2>
    <ul id="recent-list"></ul>
  </section>
</main>
<script>
(function () {
  const form = document.getElementById('form');
  const quality = document.getElementById('quality');
  const defaults = { video: '720p', audio: '192kbps' };

  function mediaType() {
    return form.querySelector('input[name=media_type]:checked').value;
  }

  function syncQuality() {
    const type = mediaType();
    let keep = false;
    quality.querySelectorAll('optgroup').forEach(function (group) {
      const active = group.dataset.type === type;
      group.disabled = !active;
      if (active && group.querySelector('option[value="' + quality.value + '"]')) keep = true;
    });
    if (!keep) quality.value = defaults[type];
  }

  function formatBytes(bytes) {
    if (!bytes) return '0 Bytes';
    const k = 1024, sizes = ['Bytes', 'KB', 'MB', 'GB'];
    const i = Math.min(Math.floor(Math.log(bytes) / Math.log(k)), sizes.length - 1);
    return parseFloat((bytes / Math.pow(k, i)).toFixed(2)) + ' ' + sizes[i];
  }

  function show(text) {
    document.getElementById('progress').style.display = 'block';
    document.getElementById('progress-text').textContent = text;
  }

  function enable() {
    document.getElementById('submit-btn').disabled = false;
  }

  // Error pages such as 413 and 405 answer in plain text.
  function readJson(r) {
    return r.text().then(function (text) {
      try {
        return JSON.parse(text);
      } catch (e) {
        throw new Error(text.trim() || 'HTTP ' + r.status);
      }
    });
  }

  function addRecent(id, url, type, q) {
    const item = document.createElement('li');
    const left = document.createElement('div');
    const title = document.createElement('div');
    title.textContent = url;
    const meta = document.createElement('div');
    meta.className = 'meta';
    meta.textContent = type + ' - ' + q + ' - ' + new Date().toLocaleTimeString();
    left.appendChild(title);
    left.appendChild(meta);
    const state = document.createElement('div');
    state.id = 'state-' + id;
    item.appendChild(left);
    item.appendChild(state);
    const list = document.getElementById('recent-list');
    list.insertBefore(item, list.firstChild);
    document.getElementById('recent').style.display = 'block';
    markRecent(id, 'downloading', 'Downloading');
  }

  function markRecent(id, kind, label) {
    const state = document.getElementById('state-' + id);
    if (!state) return;
    state.textContent = label;
    state.className = 'state-' + kind;
  }

  function poll(id) {
    fetch('/api/progress/' + encodeURIComponent(id)).then(readJson).then(function (p) {
      const fill = document.getElementById('fill');
      if (p.status === 'downloading') {
        fill.style.width = p.percent;
        const speed = p.speed ? formatBytes(p.speed) + '/s' : 'unknown speed';
        const eta = p.eta != null ? p.eta + 's left' : '';
        show(p.percent + ' of ' + formatBytes(p.total_bytes) + ' at ' + speed + ' ' + eta);
      } else if (p.status === 'finished') {
        fill.style.width = '100%';
        show('Processing ' + p.filename + '...');
      } else if (p.status === 'completed') {
        fill.style.width = '100%';
        show('Saved to ' + p.filename);
        markRecent(id, 'completed', 'Completed');
        enable();
        return;
      } else if (p.status === 'error' || p.status === 'unknown') {
        show('Download failed: ' + (p.error || 'unknown download'));
        markRecent(id, 'error', 'Error');
        enable();
        return;
      }
      setTimeout(function () { poll(id); }, 1000);
    }).catch(function (err) {
      show('Progress monitoring stopped: ' + err.message);
      markRecent(id, 'error', 'Unknown');
      enable();
    });
  }

  form.addEventListener('submit', function (e) {
    e.preventDefault();
    document.getElementById('submit-btn').disabled = true;
    document.getElementById('fill').style.width = '0';
    show('Starting download...');
    const url = form.url.value, type = mediaType(), q = quality.value;
    fetch('/api/download', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ url: url, download_type: type, quality: q })
    }).then(readJson).then(function (res) {
      if (res.success) {
        addRecent(res.download_id, url, type, q);
        poll(res.download_id);
      } else {
        show(res.error);
        enable();
      }
    }).catch(function (err) {
      show('Network error: ' + err.message);
      enable();
    });
  });

  document.getElementById('info-btn').addEventListener('click', function () {
    const box = document.getElementById('info');
    box.style.display = 'block';
    box.textContent = 'Fetching info...';
    fetch('/api/info', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ url: form.url.value })
    }).then(readJson).then(function (res) {
      if (!res.success) { box.textContent = res.error; return; }
      const d = res.data;
      box.textContent = d.title + '\n' + d.uploader + ' | ' + d.duration + ' | ' + d.view_count + ' views | ' + d.upload_date + '\n' + d.description;
      box.style.whiteSpace = 'pre-wrap';
    }).catch(function (err) {
      box.textContent = 'Network error: ' + err.message;
    });
  });

  form.querySelectorAll('input[name=media_type]').forEach(function (r) { r.addEventListener('change', syncQuality); });
  syncQuality();
})();
</script>
</body>
</html>
"#;

const STATUS_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>ytdl-web: __TITLE__</title>
<style>
  body { font-family: system-ui, sans-serif; background: #f4f5f7; margin: 0; }
  main { max-width: 640px; margin: 48px auto; background: #fff; padding: 32px; border-radius: 12px; }
  pre { white-space: pre-wrap; background: #f6f6f6; padding: 12px; border-radius: 8px; }
</style>
</head>
<body>
<main>
  <h1>__TITLE__</h1>
  <pre>__MESSAGE__</pre>
  <p><a href="/">Start a new download</a></p>
</main>
</body>
</html>
"#;

fn quality_options(media_type: MediaType, selected: &str) -> String {
    media_type
        .qualities()
        .iter()
        .map(Quality::to_string)
        .map(|value| {
            let marker = if value == selected { " selected" } else { "" };
            format!("        <option value=\"{0}\"{1}>{0}</option>", value, marker)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_notice(error: Option<&str>) -> String {
    match error {
        Some(message) => format!("<div class=\"notice error\">{}</div>", escape_html(message)),
        None => String::new(),
    }
}

/// Substitutes every placeholder in one left-to-right scan. Inserted values are
/// never scanned again, so user text that looks like a placeholder stays literal.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    loop {
        let next = values
            .iter()
            .filter_map(|(key, value)| rest.find(key).map(|pos| (pos, *key, *value)))
            .min_by_key(|(pos, _, _)| *pos);

        match next {
            Some((pos, key, value)) => {
                out.push_str(&rest[..pos]);
                out.push_str(value);
                rest = &rest[pos + key.len()..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

pub fn index_page(values: &FormValues, error: Option<&str>, download_path: &Path) -> String {
    let is_audio = values.media_type.eq_ignore_ascii_case("audio");
    let selected = if values.quality.is_empty() {
        if is_audio { "192kbps".to_string() } else { "720p".to_string() }
    } else {
        values.quality.to_lowercase()
    };

    let notice = render_notice(error);
    let url = escape_html(&values.url);
    let video_options = quality_options(MediaType::Video, &selected);
    let audio_options = quality_options(MediaType::Audio, &selected);
    let download_path = escape_html(&download_path.to_string_lossy());

    fill(
        INDEX_TEMPLATE,
        &[
            ("__NOTICE__", notice.as_str()),
            ("__URL__", url.as_str()),
            ("__VIDEO_CHECKED__", if is_audio { "" } else { "checked" }),
            ("__AUDIO_CHECKED__", if is_audio { "checked" } else { "" }),
            ("__VIDEO_OPTIONS__", video_options.as_str()),
            ("__AUDIO_OPTIONS__", audio_options.as_str()),
            ("__DOWNLOAD_PATH__", download_path.as_str()),
        ],
    )
}

pub fn status_page(title: &str, message: &str) -> String {
    let title = escape_html(title);
    let message = escape_html(message);
    fill(
        STATUS_TEMPLATE,
        &[("__TITLE__", title.as_str()), ("__MESSAGE__", message.as_str())],
    )
}
