use crate::models::{CardView, SessionUser};

pub fn render_index(user: Option<&SessionUser>, cards: &[CardView]) -> String {
    let (user_label, auth_class) = match user {
        Some(user) => (format!("Signed in as {}", escape_html(&user.name)), "signed-in"),
        None => ("Guest mode: habits are kept on this device".to_owned(), "guest"),
    };
    let rendered: String = cards.iter().map(render_card).collect();
    INDEX_HTML
        .replace("{{USER}}", &user_label)
        .replace("{{AUTH_CLASS}}", auth_class)
        .replace("{{COUNT}}", &cards.len().to_string())
        .replace("{{CARDS}}", &rendered)
}

fn render_card(view: &CardView) -> String {
    let card = &view.card;
    let title = if card.title.trim().is_empty() {
        "New habit".to_owned()
    } else {
        escape_html(&card.title)
    };
    format!(
        r#"<article class="card" data-id="{id}" style="transform: translate({x}px, {y}px) rotate({rot}deg)">
  <h3>{title}</h3>
  <p>{details}</p>
  <div class="bar"><span style="width: {pct}%"></span></div>
  <span class="pct">{pct}%</span>
</article>
"#,
        id = escape_html(&card.id.to_string()),
        x = card.x,
        y = card.y,
        rot = card.rotation,
        title = title,
        details = escape_html(&card.details),
        pct = view.percent,
    )
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Habit Tracker</title>
  <style>
    :root {
      --bg: #f6f1e7;
      --ink: #2b2a28;
      --accent: #ff6b4a;
      --accent-2: #2f4858;
      --card: #fffaf0;
      --shadow: 0 14px 30px rgba(47, 72, 88, 0.18);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: var(--bg);
      color: var(--ink);
      font-family: "Trebuchet MS", sans-serif;
      padding: 28px 18px 48px;
    }

    header {
      display: flex;
      flex-wrap: wrap;
      justify-content: space-between;
      align-items: center;
      gap: 12px;
      margin-bottom: 24px;
    }

    h1 {
      font-family: "Georgia", serif;
      margin: 0;
    }

    .auth {
      display: flex;
      gap: 8px;
      align-items: center;
    }

    .auth.signed-in form {
      display: none;
    }

    .auth.guest #logout-btn {
      display: none;
    }

    button {
      border: none;
      border-radius: 999px;
      padding: 8px 16px;
      font: inherit;
      cursor: pointer;
      background: var(--accent-2);
      color: #fff;
    }

    button.primary {
      background: var(--accent);
    }

    #board {
      display: grid;
      grid-template-columns: repeat(auto-fill, minmax(220px, 1fr));
      gap: 20px;
    }

    .card {
      background: var(--card);
      border-radius: 14px;
      box-shadow: var(--shadow);
      padding: 16px;
      touch-action: none;
      user-select: none;
      cursor: grab;
    }

    .card.dragging {
      cursor: grabbing;
      z-index: 10;
    }

    .card.celebrating {
      outline: 3px solid var(--accent);
    }

    .card h3 {
      margin: 0 0 6px;
    }

    .card input, .card textarea {
      width: 100%;
      margin-bottom: 6px;
      font: inherit;
    }

    .bar {
      height: 8px;
      border-radius: 4px;
      background: #e8dfcf;
      overflow: hidden;
    }

    .bar span {
      display: block;
      height: 100%;
      background: var(--accent);
    }

    .actions {
      display: flex;
      gap: 6px;
      flex-wrap: wrap;
      margin-top: 10px;
    }

    #status {
      min-height: 1.2em;
      color: #8a3b2b;
    }
  </style>
</head>
<body>
  <header>
    <div>
      <h1>Habit Tracker</h1>
      <p id="user-label">{{USER}}</p>
    </div>
    <div class="auth {{AUTH_CLASS}}" id="auth">
      <form id="login-form">
        <input name="email" type="email" placeholder="Email" required />
        <input name="password" type="password" placeholder="Password" required />
        <button type="submit">Sign in</button>
      </form>
      <button id="logout-btn" type="button">Sign out</button>
    </div>
  </header>

  <p id="status"></p>
  <button class="primary" id="add-btn" type="button">Add habit</button>
  <p class="hint"><span id="count">{{COUNT}}</span> habits</p>

  <section id="board">
{{CARDS}}
  </section>

  <script>
    const board = document.getElementById('board');
    const statusEl = document.getElementById('status');
    const countEl = document.getElementById('count');
    const userLabel = document.getElementById('user-label');
    const authEl = document.getElementById('auth');

    const setStatus = (message) => {
      statusEl.textContent = message || '';
      if (message) {
        setTimeout(() => { statusEl.textContent = ''; }, 2500);
      }
    };

    const escapeText = (value) => {
      const div = document.createElement('div');
      div.textContent = value == null ? '' : String(value);
      return div.innerHTML;
    };

    const api = async (method, path, body) => {
      const res = await fetch(path, {
        method,
        headers: body ? { 'content-type': 'application/json' } : {},
        body: body ? JSON.stringify(body) : undefined
      });
      if (!res.ok) {
        const msg = await res.text();
        throw new Error(msg || 'Request failed');
      }
      if (res.status === 204 || res.status === 202) {
        return null;
      }
      return res.json();
    };

    const cardPath = (id, action) => `/api/cards/${encodeURIComponent(id)}${action ? '/' + action : ''}`;

    const renderEditor = (card) => {
      const draft = card.draft || {};
      return `
        <input data-field="title" placeholder="Habit title" value="${escapeText(draft.title)}" />
        <textarea data-field="details" placeholder="Details">${escapeText(draft.details)}</textarea>
        <label><input data-field="showAdvanced" type="checkbox" ${draft.showAdvanced ? 'checked' : ''} /> Track against a deadline</label>
        <input data-field="deadline" type="date" value="${draft.deadline || ''}" />
        <div class="actions">
          <button data-action="save" class="primary">Save</button>
          <button data-action="cancel">Cancel</button>
        </div>`;
    };

    const renderView = (card) => `
      <h3>${escapeText(card.title)}</h3>
      <p>${escapeText(card.details)}</p>
      <div class="bar"><span style="width: ${card.percent}%"></span></div>
      <span class="pct">${card.percent}% &middot; ${card.completions} done</span>
      <div class="actions">
        <button data-action="complete" class="primary">Done today</button>
        <button data-action="edit">Edit</button>
        <button data-action="restart">Restart</button>
        <button data-action="delete">Delete</button>
      </div>`;

    const render = (data) => {
      userLabel.textContent = data.user
        ? `Signed in as ${data.user.name}`
        : 'Guest mode: habits are kept on this device';
      authEl.className = `auth ${data.user ? 'signed-in' : 'guest'}`;
      countEl.textContent = data.cards.length;
      board.innerHTML = data.cards
        .map((card) => `
          <article class="card ${card.celebrating ? 'celebrating' : ''}" data-id="${escapeText(card.id)}"
            style="transform: translate(${card.x}px, ${card.y}px) rotate(${card.rotation}deg)">
            ${card.editing ? renderEditor(card) : renderView(card)}
          </article>`)
        .join('');
    };

    const refresh = async () => render(await api('GET', '/api/cards'));

    const run = (promise) => promise.then(refresh).catch((err) => setStatus(err.message));

    board.addEventListener('click', (event) => {
      const button = event.target.closest('button[data-action]');
      if (!button) {
        return;
      }
      const id = button.closest('.card').dataset.id;
      const action = button.dataset.action;
      if (action === 'delete') {
        run(api('DELETE', cardPath(id)));
      } else {
        run(api('POST', cardPath(id, action)));
      }
    });

    board.addEventListener('change', (event) => {
      const field = event.target.dataset.field;
      if (!field) {
        return;
      }
      const id = event.target.closest('.card').dataset.id;
      const value = event.target.type === 'checkbox' ? event.target.checked : event.target.value;
      api('PATCH', cardPath(id, 'draft'), { [field]: value }).catch((err) => setStatus(err.message));
    });

    let drag = null;

    board.addEventListener('pointerdown', (event) => {
      const cardEl = event.target.closest('.card');
      if (!cardEl || event.target.closest('button, input, textarea, label')) {
        return;
      }
      drag = { id: cardEl.dataset.id, el: cardEl };
      cardEl.classList.add('dragging');
      cardEl.setPointerCapture(event.pointerId);
      api('POST', cardPath(drag.id, 'drag'), { phase: 'start', x: event.clientX, y: event.clientY })
        .catch((err) => setStatus(err.message));
    });

    board.addEventListener('pointermove', (event) => {
      if (!drag) {
        return;
      }
      const current = drag;
      api('POST', cardPath(current.id, 'drag'), { phase: 'move', x: event.clientX, y: event.clientY })
        .then((res) => {
          if (res && res.offset) {
            current.el.style.transform = `translate(${res.offset.x}px, ${res.offset.y}px)`;
          }
        })
        .catch(() => {});
    });

    board.addEventListener('pointerup', (event) => {
      if (!drag) {
        return;
      }
      const current = drag;
      drag = null;
      current.el.classList.remove('dragging');
      run(api('POST', cardPath(current.id, 'drag'), { phase: 'end', x: event.clientX, y: event.clientY }));
    });

    document.getElementById('add-btn').addEventListener('click', () => {
      run(api('POST', '/api/cards'));
    });

    document.getElementById('login-form').addEventListener('submit', (event) => {
      event.preventDefault();
      const form = new FormData(event.target);
      run(api('POST', '/api/auth/login', { email: form.get('email'), password: form.get('password') }));
    });

    document.getElementById('logout-btn').addEventListener('click', () => {
      run(api('POST', '/api/auth/logout'));
    });

    refresh().catch((err) => setStatus(err.message));
  </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GUEST_OWNER, HabitCard};

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html(r#"<b>"Tom" & 'Jerry'</b>"#), "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;");
    }

    #[test]
    fn index_lists_cards_and_escapes_titles() {
        let mut card = HabitCard::new_temp(9, "c".into(), GUEST_OWNER, 0, 4);
        card.title = "<script>".into();
        let view = CardView {
            card,
            editing: false,
            percent: 40,
            celebrating: false,
            draft: None,
        };
        let html = render_index(None, &[view]);
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("width: 40%"));
        assert!(html.contains("Guest mode"));
        assert!(!html.contains("{{"));
    }
}
