//! Fixed parts of every generated script

pub(crate) const HEADER: &str = r##"#!/usr/bin/env python3
# Generated by scry. Do not edit: the next repair attempt regenerates this file.
import json
import os
import re
import sys
from pathlib import Path

from playwright.sync_api import TimeoutError as PlaywrightTimeout
from playwright.sync_api import sync_playwright

OUT_DIR = Path(sys.argv[1] if len(sys.argv) > 1 else ".")
HEADLESS = os.environ.get("SCRY_HEADLESS", "1") != "0"
STEP_TIMEOUT_MS = int(os.environ.get("SCRY_STEP_TIMEOUT_MS", "30000"))
SCREENS_DIR = OUT_DIR / "screenshots"
"##;

pub(crate) const RUNTIME: &str = r##"

class StepFailure(Exception):
    def __init__(self, kind, message):
        super().__init__(message)
        self.kind = kind


def emit(event, **fields):
    print(json.dumps({"event": event, **fields}), flush=True)


def classify(page, kind, selector, exc):
    if isinstance(exc, StepFailure):
        return exc.kind
    if kind == "validate":
        return "validation_failed"
    if kind == "navigate":
        return "navigation_error"
    if isinstance(exc, PlaywrightTimeout):
        if kind == "wait_for":
            return "timeout"
        if selector is not None:
            try:
                if page.locator(selector).count() == 0:
                    return "selector_not_found"
            except Exception:
                pass
        return "timeout"
    return "unhandled_exception"


def capture(page, index, failed):
    try:
        page.screenshot(path=str(SCREENS_DIR / f"step-{index}.png"), full_page=True)
    except Exception:
        pass
    if failed:
        try:
            (OUT_DIR / "page.html").write_text(page.content(), encoding="utf-8")
        except Exception:
            pass


def run_step(page, index, kind, selector, critical, action):
    emit("step_started", step=index, kind=kind)
    try:
        action()
    except Exception as exc:
        failure = classify(page, kind, selector, exc)
        capture(page, index, True)
        if critical:
            emit("step_failed", step=index, kind=failure, message=str(exc))
            raise SystemExit(3)
        emit("step_warning", step=index, kind=failure, message=str(exc))
        return
    capture(page, index, False)
    emit("step_ok", step=index)


def settle(page):
    try:
        page.wait_for_load_state("networkidle", timeout=STEP_TIMEOUT_MS)
    except Exception:
        pass


def dismiss_consent(page):
    for name in ("Accept", "Accept all", "I agree", "Agree", "OK"):
        try:
            page.get_by_role("button", name=name).first.click(timeout=1000)
            return
        except Exception:
            continue


def expect_text(page, selector, expected):
    actual = page.locator(selector).first.text_content() or ""
    if expected not in actual:
        raise StepFailure("validation_failed", f"expected {expected!r} in {selector}")


def expect_count(page, selector, expected):
    actual = page.locator(selector).count()
    if actual != expected:
        raise StepFailure(
            "validation_failed",
            f"expected {expected} matches for {selector}, found {actual}",
        )


def read_field(scope, spec):
    try:
        node = scope.locator(spec["selector"]).first
        attribute = spec.get("attribute")
        value = node.get_attribute(attribute) if attribute else node.text_content()
    except Exception:
        return ""
    value = (value or "").strip()
    pattern = spec.get("regex")
    if pattern:
        match = re.search(pattern, value)
        if match:
            value = match.group(1) if match.groups() else match.group(0)
    if any(c.isdigit() for c in value) and all(c.isdigit() or c in ",. " for c in value):
        return int("".join(c for c in value if c.isdigit()))
    return value


def extract(page):
    result = {}
    for field, spec in EXTRACTION_SPEC.items():
        if "fields" in spec:
            items = []
            try:
                parents = page.locator(spec["selector"]).all()[: spec.get("limit", 10)]
            except Exception:
                parents = []
            for parent in parents:
                item = {}
                for name, sub in spec["fields"].items():
                    value = read_field(parent, sub)
                    if value != "":
                        item[name] = value
                if item:
                    items.append(item)
            result[field] = items
        else:
            result[field] = read_field(page, spec)
    return result


def main():
    SCREENS_DIR.mkdir(parents=True, exist_ok=True)
    with sync_playwright() as p:
        browser = p.chromium.launch(headless=HEADLESS)
        try:
            page = browser.new_context().new_page()
            page.set_default_timeout(STEP_TIMEOUT_MS)
"##;

pub(crate) const FOOTER: &str = r##"            emit("result", data=extract(page))
        finally:
            browser.close()


if __name__ == "__main__":
    main()
"##;
