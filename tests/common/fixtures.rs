//! Scripted stand-ins for the external downloader and tunnel programs

/// Netscape cookie jar used as a caller-supplied secret
pub const COOKIE_JAR: &str = "# Netscape HTTP Cookie File\n\
.example.com\tTRUE\t/\tTRUE\t0\tSESSION\ttop-secret\n";

/// Downloader that reports progress in the usual `[download]` format and succeeds.
///
/// Copies the cookie file it was given to `$STATE/cookie_copy` so tests can
/// check the payload reached the process.
pub const DOWNLOADER_OK: &str = r#"
cookie=""
url=""
while [ $# -gt 0 ]; do
  case "$1" in
    --cookies) cookie="$2"; shift 2 ;;
    --) url="$2"; shift 2 ;;
    *) shift ;;
  esac
done
if [ -n "$cookie" ]; then cat "$cookie" > "$STATE/cookie_copy"; fi
echo "$url" >> "$STATE/urls"
echo "[info] $url: Downloading 1 format(s): 137+140"
echo "[download]   0.0% of 4.00MiB at  Unknown B/s ETA Unknown"
echo "[download]  25.0% of 4.00MiB at 2.00MiB/s ETA 00:01"
echo "[download]  75.0% of 4.00MiB at 2.00MiB/s ETA 00:00"
echo "[download] 100% of 4.00MiB in 00:02"
echo "[Merger] Merging formats into \"video.mp4\""
"#;

/// Downloader that fails after partial progress
pub const DOWNLOADER_FAIL: &str = r#"
echo "[download]  12.5% of 4.00MiB"
echo "ERROR: unable to download video data: HTTP Error 403: Forbidden" >&2
exit 1
"#;

/// Tunnel that prints the usual quick-tunnel banner and keeps running
pub const TUNNEL_OK: &str = r#"
echo "INF Thank you for trying Cloudflare Tunnel." >&2
echo "INF Requesting new quick Tunnel on trycloudflare.com..." >&2
echo "INF +----------------------------------------------------+" >&2
echo "INF |  https://violet-sunset-example.trycloudflare.com   |" >&2
echo "INF +----------------------------------------------------+" >&2
exec sleep 60
"#;
