// handlers/pages.rs - HTML shell and login form

use axum::response::Html;

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>fieldmap</title>
  <meta name="viewport" content="width=device-width, initial-scale=1">
</head>
<body>
  <div id="map" data-config-url="/api/map-config" data-polygons-url="/api/polygons"></div>
  <noscript>fieldmap needs JavaScript to draw on the map.</noscript>
</body>
</html>
"#;

const LOGIN_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>fieldmap - sign in</title>
</head>
<body>
  <form id="login">
    <label for="password">Team password</label>
    <input id="password" name="password" type="password" autocomplete="current-password" required>
    <button type="submit">Sign in</button>
    <p id="error" hidden>Wrong password</p>
  </form>
  <script>
    document.getElementById("login").addEventListener("submit", async (event) => {
      event.preventDefault();
      const password = document.getElementById("password").value;
      const res = await fetch("/api/auth", {
        method: "POST",
        headers: { "Content-Type": "application/json" },
        body: JSON.stringify({ password }),
      });
      if (res.ok) {
        window.location.href = "/";
      } else {
        document.getElementById("error").hidden = false;
      }
    });
  </script>
</body>
</html>
"#;

/// GET / - Map shell (behind the page session guard)
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /login - Shared-password form
pub async fn login_form() -> Html<&'static str> {
    Html(LOGIN_HTML)
}
