use std::fs;
use std::path::{Path, PathBuf};

use i18n_patch::{Disposition, Error, PatchOptions, Patcher, SkipReason, TranslationReport};
use tempfile::TempDir;

/// A config directory, a source tree and an output directory under one temp dir.
struct Fixture {
    root: TempDir,
}

impl Fixture {
    fn new(rules: &str, locale: &str, files: &[(&str, &str)]) -> Self {
        let root = TempDir::new().unwrap();
        let config = root.path().join("config");
        fs::create_dir_all(&config).unwrap();
        fs::write(config.join("i18n.yml"), rules).unwrap();
        fs::write(config.join("ja.yml"), locale).unwrap();
        for (name, content) in files {
            let path = root.path().join("src").join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        Fixture { root }
    }

    fn src(&self) -> PathBuf {
        self.root.path().join("src")
    }

    fn out(&self) -> PathBuf {
        self.root.path().join("out")
    }

    fn options(&self) -> PatchOptions {
        PatchOptions::new()
            .with_locale("ja")
            .with_config_dir(self.root.path().join("config"))
            .with_dest(self.out())
    }

    async fn run_with(&self, options: PatchOptions) -> Result<Vec<TranslationReport>, Error> {
        Patcher::new(self.src()).with_options(options).generate(None, None).await
    }

    async fn run(&self) -> Vec<TranslationReport> {
        self.run_with(self.options()).await.unwrap()
    }

    fn read(&self, name: &str) -> String {
        read(&self.out(), name)
    }
}

fn read(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name)).unwrap()
}

#[tokio::test]
async fn test_hello_scenario() {
    let fixture = Fixture::new(
        "translations:\n  - patterns:\n      - pattern: HELLO\n        replace: '${greeting}'\n",
        "greeting: こんにちは\n",
        &[("hello.txt", "HELLO\n")],
    );
    let reports = fixture.run().await;
    assert_eq!(fixture.read("hello.txt"), "こんにちは\n");
    assert_eq!(reports[0].files, 1);
    assert_eq!(reports[0].unmatched_lines, 0);
    // The source tree is left alone when a destination is given.
    assert_eq!(read(&fixture.src(), "hello.txt"), "HELLO\n");
}

#[tokio::test]
async fn test_missing_key_keeps_file_verbatim() {
    let fixture = Fixture::new(
        "translations:\n  - patterns:\n      - pattern: HELLO\n        replace: '${greeting}'\n",
        "other: value\n",
        &[("hello.txt", "HELLO")],
    );
    let reports = fixture.run().await;
    assert_eq!(fixture.read("hello.txt"), "HELLO");
    assert_eq!(reports[0].unmatched_lines, 1);
}

#[tokio::test]
async fn test_translates_in_place_without_dest() {
    let fixture = Fixture::new(
        "translations:\n  - src: '*.txt'\n    patterns:\n      - pattern: a\n        replace: b\n",
        "",
        &[("x.txt", "a\n"), ("y.md", "a\n")],
    );
    let options = PatchOptions {
        dest: None,
        ..fixture.options()
    };
    fixture.run_with(options).await.unwrap();
    assert_eq!(read(&fixture.src(), "x.txt"), "b\n");
    assert_eq!(read(&fixture.src(), "y.md"), "a\n");
}

#[tokio::test]
async fn test_multiline_pattern() {
    let rules = r#"
translations:
  - src: test.js
    patterns:
      - pattern: 'Changelog for([^\n]*)\n(\s*)= link_to([^\n]*)\n(\s*)%span\.light'
        flags: ''
        replace: "= link_to$3$1\n$4%span.light ${changelog}"
      - pattern: Applications
        replace: '${applications}'
"#;
    let input = "/*\n  Applications\n  Changelog for\n  = link_to foobar\n  %span.light\n*/\n";
    let fixture = Fixture::new(
        rules,
        "changelog: の更新履歴\napplications: アプリケーション\n",
        &[("test.js", input)],
    );
    fixture.run().await;
    assert_eq!(
        fixture.read("test.js"),
        "/*\n  アプリケーション\n  = link_to foobar\n  %span.light の更新履歴\n*/\n"
    );
}

#[tokio::test]
async fn test_args_fill_positional_tokens() {
    let rules = r#"
translations:
  - src: test.js
    patterns:
      - pattern: 'Are you sure you want to leave \\"(.+)\\"\?'
        flags: ''
        replace: '${leave_group}'
        args:
          - '$1'
"#;
    let fixture = Fixture::new(
        rules,
        "leave_group: '本当に\\\"{0}\\\"を離脱しますか？'\n",
        &[(
            "test.js",
            "/*\n  \"Are you sure you want to leave \\\"#{group}\\\"?\"\n*/\n",
        )],
    );
    fixture.run().await;
    assert_eq!(
        fixture.read("test.js"),
        "/*\n  \"本当に\\\"#{group}\\\"を離脱しますか？\"\n*/\n"
    );
}

#[tokio::test]
async fn test_nested_template_args() {
    let rules = r#"
translations:
  - src: test.txt
    patterns:
      - pattern: 'Delete (\w+)'
        flags: ''
        replace: '${confirm}'
        args:
          - replace: '${item}'
            args: ['$1']
"#;
    let fixture = Fixture::new(
        rules,
        "confirm: '{0}を削除'\nitem: '「{0}」'\n",
        &[("test.txt", "Delete project\n")],
    );
    fixture.run().await;
    assert_eq!(fixture.read("test.txt"), "「project」を削除\n");
}

#[tokio::test]
async fn test_named_patterns_fan_out() {
    let rules = r#"
translations:
  - src: '**/*.haml'
    named-patterns:
      - name: label
        pattern: '= f\.label :{field}$'
        replace: '= f.label :{field}, "${{key}}"'
        params: [field, key]
    patterns:
      - name: label
        params:
          - field: title
            key: label_title
          - field: body
            key: label_body
"#;
    let fixture = Fixture::new(
        rules,
        "label_title: タイトル\nlabel_body: 本文\n",
        &[("views/form.haml", "= f.label :title\n= f.label :body\n= f.label :other\n")],
    );
    let reports = fixture.run().await;
    assert_eq!(
        fixture.read("views/form.haml"),
        "= f.label :title, \"タイトル\"\n= f.label :body, \"本文\"\n= f.label :other\n"
    );
    assert_eq!(reports[0].patterns, 2);
}

#[tokio::test]
async fn test_insert_after_line_pass_and_dedup() {
    let rules = r#"
translations:
  - src: test.js
    patterns:
      - pattern: foo
        replace: bar
        insert:
          at: end
          value: footer
      - pattern: baz
        replace: qux
        insert:
          at: end
          value: footer
      - insert:
          at: begin
          value: header
      - insert:
          at: end
          value: footer
"#;
    let fixture = Fixture::new(
        rules,
        "footer: '// footer'\nheader: '// header'\n",
        &[("test.js", "/*\n  foo\n  baz\n*/")],
    );
    fixture.run().await;
    assert_eq!(
        fixture.read("test.js"),
        "// header\n/*\n  bar\n  qux\n*/\n// footer\n"
    );
}

#[tokio::test]
async fn test_per_file_insert_on_untouched_file() {
    let rules = r#"
translations:
  - src: test.js
    patterns:
      - pattern: foo
        replace: bar
      - insert:
          at: end
          value: qux
"#;
    let fixture = Fixture::new(
        rules,
        "qux: '// qux'\n",
        &[("test.js", "/*\n  nothing\n*/\n")],
    );
    fixture.run().await;
    assert_eq!(fixture.read("test.js"), "/*\n  nothing\n*/\n// qux\n");
}

#[tokio::test]
async fn test_per_file_insert_keeps_binary_files_intact() {
    let rules = r#"
translations:
  - patterns:
      - pattern: foo
        replace: bar
      - insert:
          at: end
          value: footer
"#;
    let fixture = Fixture::new(rules, "footer: '// footer'\n", &[("a.js", "foo\n")]);
    let logo = [0x89, 0x50, 0xff, 0xfe, 0x0a];
    fs::write(fixture.src().join("logo.png"), logo).unwrap();

    let reports = fixture.run().await;
    assert_eq!(reports[0].files, 2);
    assert_eq!(fixture.read("a.js"), "bar\n// footer\n");
    let mut expected = logo.to_vec();
    expected.extend_from_slice(b"// footer\n");
    assert_eq!(fs::read(fixture.out().join("logo.png")).unwrap(), expected);
}

#[tokio::test]
async fn test_empty_src_uses_default_glob() {
    let fixture = Fixture::new(
        "translations:\n  - src: ''\n    patterns:\n      - pattern: foo\n        replace: bar\n",
        "",
        &[("a.js", "foo\n"), ("lib/b.js", "foo\n")],
    );
    let reports = fixture.run().await;
    assert_eq!(reports[0].files, 2);
    assert_eq!(fixture.read("a.js"), "bar\n");
    assert_eq!(fixture.read("lib/b.js"), "bar\n");
}

#[tokio::test]
async fn test_conditionals_follow_first_change() {
    let rules = r#"
translations:
  - src: '*.rb'
    conditionals:
      - insert:
          at: begin
          value: encoding
    patterns:
      - pattern: Hello
        replace: '${hello}'
"#;
    let fixture = Fixture::new(
        rules,
        "encoding: '# encoding: utf-8'\nhello: こんにちは\n",
        &[("a.rb", "puts 'Hello'\n"), ("b.rb", "puts 'Bye'\n")],
    );
    fixture.run().await;
    assert_eq!(fixture.read("a.rb"), "# encoding: utf-8\nputs 'こんにちは'\n");
    assert_eq!(fixture.read("b.rb"), "puts 'Bye'\n");
}

#[tokio::test]
async fn test_match_once_per_file() {
    let rules = r#"
translations:
  - src: '*.txt'
    patterns:
      - pattern: title
        replace: タイトル
        match-once: true
"#;
    let fixture = Fixture::new(
        rules,
        "",
        &[("a.txt", "title\ntitle\n"), ("b.txt", "x\ntitle\ntitle\n")],
    );
    fixture.run().await;
    assert_eq!(fixture.read("a.txt"), "タイトル\ntitle\n");
    assert_eq!(fixture.read("b.txt"), "x\nタイトル\ntitle\n");
}

#[tokio::test]
async fn test_skip_patterns() {
    let rules = r#"
translations:
  - src: test.js
    skip-patterns:
      - '^\s*//'
    patterns:
      - pattern: foo
        replace: bar
"#;
    let fixture = Fixture::new(rules, "", &[("test.js", "// foo\nfoo\n")]);
    fixture.run().await;
    assert_eq!(fixture.read("test.js"), "// foo\nbar\n");
}

#[tokio::test]
async fn test_evaluate_when() {
    let rules = r#"
translations:
  - src: test.js
    evaluateWhen: "semver.gte(version, '1.0.0')"
    patterns:
      - pattern: foo
        replace: FOO
"#;
    let input = "/*\n  foo\n  bar\n*/\n";

    let satisfied = Fixture::new(rules, "", &[("test.js", input)]);
    satisfied
        .run_with(satisfied.options().with_condition("version=1.1.0"))
        .await
        .unwrap();
    assert_eq!(satisfied.read("test.js"), "/*\n  FOO\n  bar\n*/\n");

    let not_satisfied = Fixture::new(rules, "", &[("test.js", input)]);
    let reports = not_satisfied
        .run_with(not_satisfied.options().with_condition("0.8.0"))
        .await
        .unwrap();
    assert_eq!(not_satisfied.read("test.js"), input);
    assert_eq!(
        reports[0].disposition,
        Disposition::Skipped(SkipReason::Condition)
    );
}

#[tokio::test]
async fn test_locale_include_and_exclude() {
    let rules = r#"
translations:
  - src: a.txt
    locale:
      include: [ja]
    patterns:
      - pattern: a
        replace: A
  - src: b.txt
    locale:
      exclude: [ja]
    patterns:
      - pattern: b
        replace: B
"#;
    let fixture = Fixture::new(rules, "", &[("a.txt", "a\n"), ("b.txt", "b\n")]);
    let reports = fixture.run().await;
    assert_eq!(fixture.read("a.txt"), "A\n");
    assert_eq!(fixture.read("b.txt"), "b\n");
    assert_eq!(reports[1].disposition, Disposition::Skipped(SkipReason::Locale));
}

#[tokio::test]
async fn test_add_creates_file() {
    let rules = r#"
translations:
  - add:
      path: config/locales/ja.yml
      value: locale_file
"#;
    let fixture = Fixture::new(rules, "locale_file: |\n  ja:\n    hello: こんにちは\n", &[]);
    fs::create_dir_all(fixture.src()).unwrap();
    let reports = fixture.run().await;
    assert_eq!(
        fixture.read("config/locales/ja.yml"),
        "ja:\n  hello: こんにちは\n"
    );
    assert_eq!(
        reports[0].disposition,
        Disposition::Added(PathBuf::from("config/locales/ja.yml"))
    );
}

#[tokio::test]
async fn test_add_with_missing_key_fails_before_touching_files() {
    let rules = r#"
translations:
  - src: a.txt
    patterns:
      - pattern: a
        replace: A
  - add:
      path: new.txt
      value: missing
"#;
    let fixture = Fixture::new(rules, "", &[("a.txt", "a\n")]);
    let err = fixture.run_with(fixture.options()).await.unwrap_err();
    assert!(matches!(err, Error::MissingLocaleKey { ref key, .. } if key == "missing"));
    assert!(!fixture.out().exists());
}

#[tokio::test]
async fn test_parallel_group_runs_before_later_stages() {
    let rules = r#"
translations:
  - src: a.txt
    parallelGroup: 1
    patterns:
      - pattern: one
        replace: two
  - src: b.txt
    patterns:
      - pattern: two
        replace: three
  - src: b.txt
    parallelGroup: 1
    patterns:
      - pattern: one
        replace: two
  - src: '*.txt'
    patterns:
      - pattern: two
        replace: four
"#;
    let fixture = Fixture::new(rules, "", &[("a.txt", "one\n"), ("b.txt", "one\n")]);
    let reports = fixture.run().await;
    // The group runs where it is first declared, so b.txt is already `two` for stage 2.
    assert_eq!(fixture.read("a.txt"), "four\n");
    assert_eq!(fixture.read("b.txt"), "three\n");
    let ids: Vec<usize> = reports.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_broken_pattern_is_fatal() {
    let rules = r#"
translations:
  - src: a.txt
    patterns:
      - pattern: '(unclosed'
        flags: g
        replace: x
"#;
    let fixture = Fixture::new(rules, "", &[("a.txt", "a\n")]);
    let err = fixture.run_with(fixture.options()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidPattern { .. }));
}

#[tokio::test]
async fn test_statistics_summary() {
    let rules = r#"
translations:
  - name: greetings
    src: '*.txt'
    patterns:
      - pattern: HELLO
        replace: '${greeting}'
      - pattern: BYE
        replace: '${bye}'
"#;
    let fixture = Fixture::new(
        rules,
        "greeting: hi\nbye: bye\n",
        &[("a.txt", "HELLO\n"), ("b.txt", "BYE\nplain\n")],
    );
    let reports = fixture
        .run_with(fixture.options().with_statistics(true))
        .await
        .unwrap();
    let summary = reports[0].summary();
    assert!(
        summary.starts_with("[1] (greetings): processed 2 files for 2 patterns in "),
        "{}",
        summary
    );
    assert!(summary.ends_with(" (1 unmatched lines)"), "{}", summary);
}
