use crate::loader::{CONTAINER_ID, RUNTIME_GLOBAL};
use crate::runtime::{SUBMIT_FAILED_ALERT, SUBMITTED_HEADLINE};
use crate::widget::WidgetConfig;

/// Browser runtime served as `widget-bundle.js`.
///
/// Mirrors the native runtime: toggle button, popup with Filling/Submitted
/// phases, required fields, a single POST per submit with the button
/// disabled while it is outstanding.
pub fn runtime_bundle() -> String {
    let script = r#"// Clicki widget runtime
(function(global) {
  var ICONS = { name: "user", phone: "phone", email: "mail", business: "building" };
  var INPUT_TYPES = { text: true, email: true, tel: true, number: true };

  function el(tag, attrs, children) {
    var node = document.createElement(tag);
    Object.keys(attrs || {}).forEach(function(key) {
      if (key === "text") {
        node.textContent = attrs[key];
      } else if (key === "style") {
        node.style.cssText = attrs[key];
      } else {
        node.setAttribute(key, attrs[key]);
      }
    });
    (children || []).forEach(function(child) {
      if (child) node.appendChild(child);
    });
    return node;
  }

  // Missing keys take the builder defaults, nulls become empty.
  function pick(cfg, key, fallback, empty) {
    if (cfg[key] === undefined) return fallback;
    return cfg[key] === null ? empty : cfg[key];
  }

  function normalize(config) {
    var cfg = config || {};
    var fields = pick(cfg, "formFields", __DEFAULT_FIELDS__, []);
    return {
      videoUrl: String(pick(cfg, "videoUrl", "", "")),
      rewardsText: String(pick(cfg, "rewardsText", "", "")),
      headerText: String(pick(cfg, "headerText", "__DEFAULT_HEADER__", "")),
      formFields: (Array.isArray(fields) ? fields : []).map(function(f) {
        var type = String((f && f.type) || "text").toLowerCase();
        return {
          label: String((f && f.label) || ""),
          type: INPUT_TYPES[type] ? type : "text",
          name: String((f && f.name) || "")
        };
      }),
      webhookUrl: String(pick(cfg, "webhookUrl", "", "")),
      widgetColor: String(pick(cfg, "widgetColor", "__DEFAULT_COLOR__", "")),
      buttonColor: String(pick(cfg, "buttonColor", "__DEFAULT_COLOR__", ""))
    };
  }

  function iconFor(name) {
    var key = String(name || "").toLowerCase();
    if (!Object.prototype.hasOwnProperty.call(ICONS, key)) return null;
    return el("span", { "class": "clicki-icon", "data-icon": ICONS[key], "aria-hidden": "true" });
  }

  function ClickiWidget(config) {
    this.config = normalize(config);
    this.container = document.getElementById("__CONTAINER_ID__");
    if (!this.container) {
      console.error("Clicki widget container not found");
      return;
    }
    this.popup = null;
    this.render();
  }

  ClickiWidget.prototype.toggle = function() {
    if (this.popup) {
      this.popup = null;
    } else {
      this.popup = { formData: {}, submitted: false, inFlight: false };
    }
    this.render();
  };

  ClickiWidget.prototype.render = function() {
    var self = this;
    while (this.container.firstChild) {
      this.container.removeChild(this.container.firstChild);
    }
    var toggle = el("button", {
      type: "button",
      "class": "clicki-toggle" + (this.popup ? "" : " clicki-pulse"),
      style: "background-color: " + this.config.widgetColor,
      "aria-label": "Open widget"
    }, [el("span", { "class": "clicki-icon", "data-icon": "gift", "aria-hidden": "true" })]);
    toggle.addEventListener("click", function() { self.toggle(); });
    this.container.appendChild(toggle);
    if (this.popup) {
      this.container.appendChild(this.renderPopup());
    }
  };

  ClickiWidget.prototype.renderPopup = function() {
    var self = this;
    var cfg = this.config;
    var popup = this.popup;
    var close = el("button", { type: "button", "class": "clicki-close", "aria-label": "Close", text: "×" });
    close.addEventListener("click", function() { self.toggle(); });
    var root = el("div", { "class": "clicki-popup", "data-state": popup.submitted ? "submitted" : "filling" }, [
      el("div", { "class": "clicki-popup-header" }, [
        el("h2", { text: popup.submitted ? "Thank You!" : cfg.headerText }),
        close
      ])
    ]);
    var body = el("div", { "class": "clicki-popup-body" });
    root.appendChild(body);

    if (popup.submitted) {
      body.appendChild(el("div", { "class": "clicki-thanks" }, [
        el("h3", { text: "__SUBMITTED_HEADLINE__" }),
        el("p", { text: "Thank you for your referral. We appreciate your support!" })
      ]));
      return root;
    }

    if (cfg.videoUrl) {
      body.appendChild(el("div", { "class": "clicki-video" }, [
        el("iframe", {
          width: "100%",
          height: "200",
          src: cfg.videoUrl,
          title: "Embedded video",
          frameborder: "0",
          allow: "accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture",
          allowfullscreen: ""
        })
      ]));
    }
    if (cfg.rewardsText) {
      body.appendChild(el("div", { "class": "clicki-rewards" }, [
        el("h3", { text: "Earn rewards!" }),
        el("p", { text: cfg.rewardsText })
      ]));
    }

    var form = el("form", { "class": "clicki-form" });
    cfg.formFields.forEach(function(field) {
      var input = el("input", {
        type: field.type,
        id: field.name,
        name: field.name,
        placeholder: "Enter " + field.label.toLowerCase()
      });
      input.required = true;
      if (popup.formData[field.name] !== undefined) input.value = popup.formData[field.name];
      input.addEventListener("input", function(e) {
        popup.formData[e.target.name] = e.target.value;
      });
      form.appendChild(el("div", { "class": "clicki-field" }, [
        el("label", { "for": field.name, text: field.label }),
        el("div", { "class": "clicki-input" }, [iconFor(field.name), input])
      ]));
    });
    body.appendChild(form);

    var submit = el("button", {
      type: "submit",
      "class": "clicki-submit",
      style: "background-color: " + cfg.buttonColor,
      text: "Send Referral"
    });
    submit.disabled = popup.inFlight;
    submit.addEventListener("click", function(e) {
      e.preventDefault();
      if (form.reportValidity && !form.reportValidity()) return;
      self.submit(popup, submit);
    });
    form.addEventListener("submit", function(e) {
      e.preventDefault();
      self.submit(popup, submit);
    });
    root.appendChild(el("div", { "class": "clicki-popup-footer" }, [submit]));
    root.appendChild(el("div", { "class": "clicki-branding" }, [
      el("a", { href: "https://joinclicki.com/?widget", target: "_blank", rel: "noopener noreferrer" }, [
        el("img", {
          src: "https://clicki-unlayer-uploads.s3.us-east-1.amazonaws.com/1712037184377-Group+46923.png",
          alt: "Get more referrals with Clicki"
        })
      ])
    ]));
    return root;
  };

  ClickiWidget.prototype.submit = function(popup, button) {
    var self = this;
    if (popup.inFlight || popup.submitted) return;
    popup.inFlight = true;
    button.disabled = true;
    fetch(this.config.webhookUrl, {
      method: "POST",
      headers: { "Content-Type": "application/json" },
      body: JSON.stringify(popup.formData)
    }).then(function(response) {
      if (!response.ok) throw new Error("Form submission failed");
      popup.inFlight = false;
      popup.submitted = true;
      popup.formData = {};
      if (self.popup === popup) self.render();
    }).catch(function(error) {
      popup.inFlight = false;
      button.disabled = false;
      console.error("Error submitting form:", error);
      if (self.popup === popup) alert("__SUBMIT_FAILED_ALERT__");
    });
  };

  global.__RUNTIME_GLOBAL__ = ClickiWidget;
})(window);
"#;
    script
        .replace("__CONTAINER_ID__", CONTAINER_ID)
        .replace("__RUNTIME_GLOBAL__", RUNTIME_GLOBAL)
        .replace("__SUBMITTED_HEADLINE__", SUBMITTED_HEADLINE)
        .replace("__SUBMIT_FAILED_ALERT__", SUBMIT_FAILED_ALERT)
        .replace("__DEFAULT_HEADER__", crate::widget::DEFAULT_HEADER_TEXT)
        .replace("__DEFAULT_COLOR__", crate::widget::DEFAULT_COLOR)
        .replace("__DEFAULT_FIELDS__", &default_fields_json())
}

fn default_fields_json() -> String {
    serde_json::to_string(&WidgetConfig::default().form_fields).unwrap_or_else(|_| "[]".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_runtime_global() {
        let script = runtime_bundle();
        assert!(script.contains("global.ClickiWidget = ClickiWidget;"));
        assert!(script.contains(r#"document.getElementById("clicki-widget-container")"#));
        assert!(!script.contains("__"));
        assert!(script.contains(r#""name":"referralPhone""#));
    }

    #[test]
    fn posts_json_and_guards_resubmits() {
        let script = runtime_bundle();
        assert!(script.contains(r#"headers: { "Content-Type": "application/json" }"#));
        assert!(script.contains("body: JSON.stringify(popup.formData)"));
        assert!(script.contains("if (popup.inFlight || popup.submitted) return;"));
        assert!(script.contains("popup.submitted = true;\n      popup.formData = {};"));
        assert!(script.contains("Failed to submit form. Please try again."));
    }
}
