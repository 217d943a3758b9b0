use calcdoc::Document;
use calcdoc::format::Format;
use calcdoc::parser::{Parser, ParserOptions, parse_file, parse_markdown, parse_outline};
use calcdoc::section::SectionItem;

fn parse_md(source: &str) -> Document {
    parse_file(source, Some("test.md"), ParserOptions::default()).expect("parse failed")
}

fn parse_org(source: &str) -> Document {
    parse_file(source, Some("test.org"), ParserOptions::default()).expect("parse failed")
}

fn names(doc: &Document) -> Vec<&str> {
    doc.sections.iter().map(|s| s.name.as_str()).collect()
}

/// Items of a section as `var:name` / `content:text` strings.
fn item_shape(doc: &Document, section: usize) -> Vec<String> {
    doc.sections[section]
        .items
        .iter()
        .map(|item| match item {
            SectionItem::Variable(v) => format!("var:{}", v.name),
            SectionItem::Content(c) => format!("content:{}", c.text),
        })
        .collect()
}

#[test]
fn two_sections_with_input_and_calculation() {
    let doc = parse_md("## Inputs\n\nprice = 100\n\n## Calc\n\ntotal = price * 2");
    assert_eq!(names(&doc), vec!["Inputs", "Calc"]);
    assert_eq!(doc.variables.len(), 2);
    assert!(doc.variables[0].is_input);
    assert!(!doc.variables[1].is_input);
    assert_eq!(doc.input_variables, vec!["price"]);
    assert_eq!(doc.variables[1].section, "Calc");
}

#[test]
fn single_markdown_section() {
    let doc = parse_md("## Input Values\n\nx = 10\ny = 5");
    assert_eq!(doc.format, Format::Markdown);
    assert_eq!(names(&doc), vec!["Input Values"]);
    assert_eq!(doc.variables.len(), 2);
}

#[test]
fn heading_levels() {
    let doc = parse_md("## Level 2\n\nx = 1\n\n### Level 3\n\ny = 2\n\n#### Level 4\n\nz = 3");
    let levels: Vec<usize> = doc.sections.iter().map(|s| s.level).collect();
    assert_eq!(levels, vec![2, 3, 4]);

    let doc = parse_org("* One\nx = 1\n** Two\ny = 2\n***** Five\nz = 3");
    let levels: Vec<usize> = doc.sections.iter().map(|s| s.level).collect();
    assert_eq!(levels, vec![1, 2, 5]);
}

#[test]
fn input_detection() {
    let doc = parse_md(
        "## Variables\n\ninputValue = 42\ncalculated = inputValue * 2\nanotherInput = 100\nrate = 0.08\nneg = -10\nblank =",
    );
    assert_eq!(
        doc.input_variables,
        vec!["inputValue", "anotherInput", "rate", "neg", "blank"]
    );
    assert_eq!(doc.calculated_variables().count(), 1);
}

#[test]
fn explicit_inputs_override_detection() {
    let options = ParserOptions {
        auto_detect_inputs: false,
        explicit_inputs: vec!["x".to_string()],
        ..ParserOptions::default()
    };
    let doc = parse_file("## Variables\n\nx = a + b\ny = 5", Some("test.md"), options).unwrap();
    assert_eq!(doc.input_variables, vec!["x"]);
    assert!(doc.variables[0].is_input);
    assert!(!doc.variables[1].is_input);
}

#[test]
fn hidden_sections() {
    let doc = parse_md(
        "## Visible Section\n\nx = 10\n\n### Hidden Calculations :hidden:\n\nintermediate = x * 2\n\n## Final Result\n\nresult = intermediate * 3",
    );
    let hidden: Vec<bool> = doc.sections.iter().map(|s| s.hidden).collect();
    assert_eq!(hidden, vec![false, true, false]);
    assert_eq!(doc.sections[1].name, "Hidden Calculations");
    assert_eq!(doc.visible_sections().count(), 2);

    let doc = parse_md("### Hidden Calc :hidden:\nx = 1\n### Visible :tag1:tag2:\ny = 2");
    assert!(doc.sections[0].hidden);
    assert!(!doc.sections[1].hidden);
    assert_eq!(doc.sections[1].name, "Visible");

    let doc = parse_md("## Section :tag1:hidden:tag2:\nx = 5");
    assert!(doc.sections[0].hidden);
}

#[test]
fn emoji_stripped_from_names() {
    let doc = parse_md("## 📊 Data\nd = 1\n### 🎯 Target Values\nt = 2");
    assert_eq!(names(&doc), vec!["Data", "Target Values"]);
}

#[test]
fn malformed_headers_are_ignored() {
    let doc = parse_md("## Valid Section\nx = 10\n#NoSpace\n##AlsoNotAHeader\ny = 20");
    assert_eq!(names(&doc), vec!["Valid Section"]);
    assert_eq!(doc.variables.len(), 2);
    assert_eq!(item_shape(&doc, 0), vec!["var:x", "var:y"]);

    let doc = parse_md("#NoSpace");
    assert!(doc.is_empty());
}

#[test]
fn fenced_code_is_skipped_whole() {
    let doc = parse_md("## Section\nx = 10\n```javascript\nconst code = 'ignored';\nz = 3\n# not a header\n```\ny = 20");
    assert_eq!(names(&doc), vec!["Section"]);
    let vars: Vec<&str> = doc.variables.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(vars, vec!["x", "y"]);
    assert_eq!(item_shape(&doc, 0), vec!["var:x", "var:y"]);
}

#[test]
fn org_directives_are_skipped() {
    let doc = parse_org(
        "** Section\n\n#+TITLE: My Document\n#+AUTHOR: Someone\nx = 10\n#+OPTIONS: toc:nil\ny = 20",
    );
    assert_eq!(doc.variables.len(), 2);
    assert_eq!(item_shape(&doc, 0), vec!["var:x", "var:y"]);
}

#[test]
fn org_tags() {
    let doc = parse_org("** Project Alpha :work:project:\n\nbudget = 50000\n\n** Private Notes :personal:hidden:\n\nnotes = 123");
    assert_eq!(names(&doc), vec!["Project Alpha", "Private Notes"]);
    assert!(!doc.sections[0].hidden);
    assert!(doc.sections[1].hidden);
}

#[test]
fn org_malformed_headers_become_prose() {
    let doc = parse_org("** Valid Section\n\nx = 10\n*NotAHeader\n**AlsoNotAHeader\ny = 20");
    assert_eq!(doc.sections.len(), 1);
    assert_eq!(doc.variables.len(), 2);
    assert_eq!(
        item_shape(&doc, 0),
        vec!["var:x", "content:*NotAHeader\n**AlsoNotAHeader", "var:y"]
    );
}

#[test]
fn financial_outline_example() {
    let doc = parse_org(
        "** Initial Investment\n\nprincipal = 10000\nannualRate = 7.5\nyears = 10\n\n\
         ** Growth Calculation :hidden:\n\nmonthlyRate = annualRate / 12 / 100\nmonths = years * 12\n\n\
         ** Results\n\nfutureValue = principal * (1 + monthlyRate)^months\ntotalGain = futureValue - principal\n\
         returnPercent = (totalGain / principal) * 100",
    );
    assert_eq!(doc.sections.len(), 3);
    assert!(doc.sections[1].hidden);
    assert_eq!(doc.input_variables.len(), 3);
    assert_eq!(doc.calculated_variables().count(), 5);
}

#[test]
fn order_within_sections_and_documents() {
    let doc = parse_md("## First\na = 1\nb = 2\n## Second\nc = 3\n## Third\nd = 4\ne = 5");
    let orders: Vec<usize> = doc.variables.iter().map(|v| v.order).collect();
    assert_eq!(orders, vec![0, 1, 0, 0, 1]);
    let section_orders: Vec<usize> = doc.sections.iter().map(|s| s.order).collect();
    assert_eq!(section_orders, vec![0, 1, 2]);
}

#[test]
fn flattened_sections_reproduce_variables() {
    let doc = parse_md("## A\nx = 1\ny = x + 1\n## B\nz = y * 2\n### C :hidden:\nv = z");
    let flattened: Vec<_> = doc.sections.iter().flat_map(|s| s.variables.iter().cloned()).collect();
    assert_eq!(flattened, doc.variables);
}

#[test]
fn reopened_section_keeps_declaration_order_in_variables() {
    let doc = parse_md(
        "## A\nx = 1\ny = x + 1\n## B\nz = y * 2\n## A\nw = z - x\n### C :hidden:\nv = w",
    );
    let declared: Vec<&str> = doc.variables.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(declared, vec!["x", "y", "z", "w", "v"]);
    let by_section: Vec<&str> = doc
        .sections
        .iter()
        .flat_map(|s| s.variables.iter().map(|v| v.name.as_str()))
        .collect();
    assert_eq!(by_section, vec!["x", "y", "w", "z", "v"]);
}

#[test]
fn recurring_section_reopens_the_first() {
    let doc = parse_md("## A :hidden:\nx = 1\n## B\ny = 2\n### A\nz = 3\nMore about A.");
    assert_eq!(names(&doc), vec!["A", "B"]);
    let a = doc.section("A").unwrap();
    assert!(a.hidden);
    assert_eq!(a.level, 2);
    assert_eq!(item_shape(&doc, 0), vec!["var:x", "var:z", "content:More about A."]);
    assert_eq!(a.variables[1].order, 1);
    // Flat order is declaration order, not section order
    let vars: Vec<&str> = doc.variables.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(vars, vec!["x", "y", "z"]);
}

#[test]
fn prose_interleaves_with_variables() {
    let doc = parse_org("** Section\n\nx = 10\ny = 20\n\nThis is content at the end.\nWith multiple lines.");
    assert_eq!(
        item_shape(&doc, 0),
        vec![
            "var:x",
            "var:y",
            "content:This is content at the end.\nWith multiple lines."
        ]
    );
    match &doc.sections[0].items[2] {
        SectionItem::Content(block) => assert!(block.html.contains("content at the end")),
        SectionItem::Variable(v) => panic!("expected content, got variable {}", v.name),
    }

    let doc = parse_org("** Introduction\n\nSome text with content.\n\nx = 10");
    assert_eq!(item_shape(&doc, 0), vec!["content:Some text with content.", "var:x"]);
}

#[test]
fn blank_only_content_is_not_kept() {
    let doc = parse_org("** Section\n\n\n\nx = 10");
    assert_eq!(item_shape(&doc, 0), vec!["var:x"]);
}

#[test]
fn paragraph_breaks_survive_in_content() {
    let doc = parse_md("## Notes\nFirst paragraph.\n\n\nSecond paragraph.\nx = 1");
    assert_eq!(
        item_shape(&doc, 0),
        vec!["content:First paragraph.\n\nSecond paragraph.", "var:x"]
    );
    let block = doc.sections[0].content_blocks().next().unwrap();
    assert_eq!(block.html.matches("<p>").count(), 2);
}

#[test]
fn story_example_keeps_the_note() {
    let source = r#"# Price Calculator

**Note:** The "Hidden Calculations" section is tagged with `:hidden:`.

## Input Values

basePrice = 100
taxRate = 0.08
discountPercent = 10

### Hidden Calculations :hidden:

discountAmount = basePrice * (discountPercent / 100)
priceAfterDiscount = basePrice - discountAmount

#### Final Result

totalPrice = priceAfterDiscount * (1 + taxRate)
"#;
    let doc = parse_file(source, None, ParserOptions::default()).unwrap();
    assert_eq!(
        names(&doc),
        vec!["Price Calculator", "Input Values", "Hidden Calculations", "Final Result"]
    );
    let intro = doc.sections[0].content_blocks().next().unwrap();
    assert!(intro.html.contains("<strong>Note:</strong>"));
    assert!(intro.html.contains("<code>:hidden:</code>"));
    assert_eq!(doc.input_variables.len(), 3);
}

#[test]
fn text_without_headers_has_no_sections() {
    let doc = parse_md("Just some text\nwithout sections\nor variables");
    assert!(doc.sections.is_empty());
    assert!(doc.variables.is_empty());

    let doc = parse_org("");
    assert!(doc.sections.is_empty());
}

#[test]
fn leading_assignments_open_an_implicit_section() {
    let doc = parse_md("Intro text.\nx = 1\n## Named\ny = x + 1");
    assert_eq!(names(&doc), vec!["", "Named"]);
    assert_eq!(doc.sections[0].level, 0);
    assert_eq!(item_shape(&doc, 0), vec!["content:Intro text.", "var:x"]);
    assert_eq!(doc.variables[0].section, "");
}

#[test]
fn prose_before_first_header_is_dropped() {
    let doc = parse_md("Preamble.\n## Section\nx = 1");
    assert_eq!(names(&doc), vec!["Section"]);
    assert_eq!(item_shape(&doc, 0), vec!["var:x"]);
}

#[test]
fn duplicate_names_are_rejected() {
    let errors = parse_md_err("## A\nx = 1\ny = 2\n## B\nx = 3\ny = y + 1");
    assert_eq!(errors.len(), 2);
    assert!(errors[0].message.contains("'x'"));
    assert_eq!(errors[0].line, Some(5));
    assert!(errors[0].notes[0].contains("line 2"));
    assert_eq!(errors[1].line, Some(6));
}

fn parse_md_err(source: &str) -> Vec<calcdoc::parser::ParseError> {
    match parse_file(source, Some("test.md"), ParserOptions::default()) {
        Ok(_) => panic!("expected parse errors"),
        Err(errors) => errors,
    }
}

#[test]
fn error_spans_cover_the_line() {
    let source = "## A\nx = 1\nx = 2\n";
    let errors = parse_md_err(source);
    assert_eq!(&source[errors[0].span.clone()], "x = 2");
}

#[test]
fn format_detection_and_wrappers() {
    let doc = parse_file("\n** Section\n\nx = 10", None, ParserOptions::default()).unwrap();
    assert_eq!(doc.format, Format::Outline);

    let doc = parse_markdown("** Section\nx = 10", ParserOptions::default()).unwrap();
    assert_eq!(doc.format, Format::Markdown);
    assert!(doc.sections.is_empty() || doc.sections[0].name.is_empty());

    let doc = parse_outline("** Section\nx = 10\ny = 20", ParserOptions::default()).unwrap();
    assert_eq!(doc.format, Format::Outline);
    assert_eq!(doc.variables.len(), 2);
}

#[test]
fn custom_renderer_and_structure_only() {
    let source = "## S\nSome *prose*.\nx = 1".to_string();
    let parser = Parser::new(source, 0);

    let plain = parser.parse_structure().unwrap();
    let block = plain.sections[0].content_blocks().next().unwrap();
    assert_eq!(block.text, "Some *prose*.");
    assert!(block.html.is_empty());

    let shouted = parser.parse_with_renderer(&|text: &str| text.to_uppercase()).unwrap();
    let block = shouted.sections[0].content_blocks().next().unwrap();
    assert_eq!(block.html, "SOME *PROSE*.");
}

#[test]
fn language_is_carried() {
    let options = ParserOptions {
        language: "elisp".to_string(),
        ..ParserOptions::default()
    };
    let doc = parse_file("* S\nx = 1", Some("a.org"), options).unwrap();
    assert_eq!(doc.language, "elisp");
}

#[test]
fn json_round_trip() {
    let doc = parse_md("## Inputs\nprice = 100\nSome note.\n## Calc\ntotal = price * 2");
    let json = doc.to_json().unwrap();
    assert!(json.contains("\"inputVariables\""));
    assert!(json.contains("\"isInput\": true"));
    assert!(json.contains("\"type\": \"content\""));
    assert!(json.contains("\"format\": \"markdown\""));

    let back = Document::from_json(&json).unwrap();
    assert_eq!(back.sections.len(), 2);
    assert_eq!(back.variables[1].expression, "price * 2");
    assert_eq!(back.input_variables, doc.input_variables);
}
