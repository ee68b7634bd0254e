//! End-to-end runs through the public pipeline API.

use callscope::{MatchType, Pipeline, PipelineOutput, ResolutionStatus};
use serde_json::{json, Value};

fn func(id: &str, name: &str, file: &str, lang: &str, start: u32, end: u32) -> Value {
    json!({
        "id": id, "name": name, "filePath": file, "lang": lang,
        "startLine": start, "endLine": end
    })
}

fn call(file: &str, callee: &str, line: u32) -> Value {
    json!({"filePath": file, "calleeName": callee, "line": line})
}

fn run(payload: Value) -> PipelineOutput {
    Pipeline::default().run_documents(vec![payload]).unwrap()
}

fn summary(output: &PipelineOutput) -> Value {
    serde_json::to_value(&output.summary).unwrap()
}

/// Plain function nodes connected by call edges.
fn call_graph(ids: &[&str], edges: &[(&str, &str)]) -> Value {
    let functions: Vec<Value> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let start = i as u32 * 10 + 1;
            func(id, id, "g.py", "python", start, start + 5)
        })
        .collect();
    let edges: Vec<Value> = edges
        .iter()
        .map(|(s, t)| json!({"source": s, "target": t}))
        .collect();
    json!({"functions": functions, "callEdges": edges})
}

fn resolution_of(output: &PipelineOutput, source: &str, target: &str) -> (ResolutionStatus, Option<MatchType>) {
    let graph = &output.graph;
    let s = graph.index_of(source).unwrap();
    let t = graph.index_of(target).unwrap();
    let edge = graph.call_edge(s, t).unwrap();
    let resolution = edge.resolution.as_ref().unwrap();
    (resolution.status, resolution.match_type)
}

#[test]
fn local_call_resolves_locally() {
    let output = run(json!({
        "functions": [
            func("main", "main", "src/app.ts", "typescript", 1, 10),
            func("foo", "foo", "src/app.ts", "typescript", 12, 15)
        ],
        "calls": [call("src/app.ts", "foo", 4)]
    }));

    assert_eq!(
        resolution_of(&output, "main", "foo"),
        (ResolutionStatus::Resolved, Some(MatchType::Local))
    );
    assert_eq!(output.summary.resolution.resolved, 1);
}

#[test]
fn named_import_resolves_exact() {
    let output = run(json!({
        "functions": [
            func("main", "main", "src/app.ts", "typescript", 1, 10),
            {"id": "m.bar", "name": "bar", "filePath": "src/m.ts", "lang": "typescript",
             "moduleId": "M", "startLine": 1, "endLine": 5},
            {"id": "n.bar", "name": "bar", "filePath": "lib/n.ts", "lang": "typescript",
             "moduleId": "N", "startLine": 1, "endLine": 5}
        ],
        "imports": [{"filePath": "src/app.ts", "local": "bar", "from": "M", "moduleId": "M"}],
        "calls": [call("src/app.ts", "bar", 3)]
    }));

    assert_eq!(
        resolution_of(&output, "main", "m.bar"),
        (ResolutionStatus::Resolved, Some(MatchType::ImportExact))
    );
    let graph = &output.graph;
    let main = graph.index_of("main").unwrap();
    assert_eq!(graph.callees(main).len(), 1);
}

#[test]
fn unrelated_helpers_fan_out_as_ambiguous() {
    let output = run(json!({
        "functions": [
            func("main", "main", "src/app.ts", "typescript", 1, 10),
            func("h1", "helper", "alpha/one.ts", "typescript", 1, 5),
            func("h2", "helper", "beta/two.ts", "typescript", 1, 5),
            func("h3", "helper", "gamma/three.ts", "typescript", 1, 5)
        ],
        "calls": [call("src/app.ts", "helper", 3)]
    }));

    assert_eq!(output.summary.resolution.ambiguous, 1);
    for target in ["h1", "h2", "h3"] {
        let (status, match_type) = resolution_of(&output, "main", target);
        assert_eq!(status, ResolutionStatus::Ambiguous);
        assert_eq!(match_type, Some(MatchType::External));
    }
    assert_eq!(output.summary.build.call_edges.added, 3);
}

#[test]
fn unresolved_call_reuses_virtual_node() {
    let payload = |calls: Vec<Value>| {
        json!({
            "functions": [func("main", "main", "src/app.js", "javascript", 1, 20)],
            "calls": calls
        })
    };

    let once = run(payload(vec![call("src/app.js", "doStuff", 3)]));
    let twice = run(payload(vec![
        call("src/app.js", "doStuff", 3),
        call("./src/app.js", "doStuff", 9),
    ]));

    assert_eq!(once.graph.node_count(), 2);
    assert_eq!(twice.graph.node_count(), 2);

    let virtual_id = "virtual::src/app.js::doStuff";
    let node = twice.graph.node_by_id(virtual_id).unwrap();
    assert!(node.is_virtual);
    let edge = twice
        .graph
        .call_edge(
            twice.graph.index_of("main").unwrap(),
            twice.graph.index_of(virtual_id).unwrap(),
        )
        .unwrap();
    assert_eq!(edge.weight, 2.0);
    assert_eq!(edge.call_sites.len(), 2);
    assert_eq!(summary(&twice)["build"]["nodes"]["virtual"], json!(1));
}

#[test]
fn call_edges_connect_real_sources_to_known_nodes() {
    let output = run(json!({
        "functions": [
            func("a", "a", "x.py", "python", 1, 10),
            func("b", "b", "x.py", "python", 12, 20)
        ],
        "calls": [call("x.py", "b", 2), call("x.py", "missing", 3), call("x.py", "b", 40)],
        "callEdges": [
            {"source": "b", "target": "external::requests.get"},
            {"source": "b", "target": "ghost"},
            {"source": "nobody", "target": "a"}
        ]
    }));

    let graph = &output.graph;
    for edge in graph.call_edges() {
        let source = graph.node_by_id(&edge.source).unwrap();
        assert!(!source.is_virtual, "virtual source {}", edge.source);
        assert!(graph.contains(&edge.target));
    }
    assert!(graph.contains("external::requests.get"));
    assert!(!graph.contains("ghost"));
    assert_eq!(output.summary.resolution.no_enclosing_function, 1);
    assert_eq!(output.summary.build.call_edges.dangling, 2);
}

#[test]
fn triangle_cores_and_clique() {
    let output = run(call_graph(
        &["A", "B", "C"],
        &[("A", "B"), ("B", "A"), ("B", "C"), ("C", "B"), ("C", "A"), ("A", "C")],
    ));
    let s = summary(&output);

    assert_eq!(s["cliques"]["coreNumbers"], json!({"A": 2, "B": 2, "C": 2}));
    assert_eq!(s["cliques"]["degeneracy"], json!(2));
    assert_eq!(s["cliques"]["cliques"], json!([["A", "B", "C"]]));
    assert_eq!(s["cliques"]["truncated"], json!(false));
}

#[test]
fn path_cores_and_cliques() {
    let output = run(call_graph(
        &["A", "B", "C", "D"],
        &[("A", "B"), ("B", "C"), ("C", "D")],
    ));
    let cores = &output.summary.cliques;

    assert!(cores.core_numbers.values().all(|&c| c == 1));
    assert_eq!(cores.degeneracy, 1);
    let mut cliques = cores.cliques.clone();
    cliques.sort();
    assert_eq!(cliques, vec![vec!["A", "B"], vec!["B", "C"], vec!["C", "D"]]);
}

#[test]
fn core_number_bounded_by_degree() {
    let output = run(call_graph(
        &["a", "b", "c", "d", "e", "f"],
        &[("a", "b"), ("b", "c"), ("c", "a"), ("c", "d"), ("d", "e"), ("a", "d"), ("b", "d")],
    ));
    let cores = &output.summary.cliques;
    let degree = &output.summary.centrality.degree;

    for (id, &core) in &cores.core_numbers {
        assert!(core <= degree[id].undirected, "{id}: core {core} > degree");
    }
    assert_eq!(cores.degeneracy, *cores.core_numbers.values().max().unwrap());
    assert_eq!(cores.core_numbers["d"], 3);
    assert_eq!(cores.core_numbers["f"], 0);
}

#[test]
fn pagerank_sums_to_one() {
    let output = run(call_graph(
        &["a", "b", "c", "d"],
        &[("a", "b"), ("b", "c"), ("c", "a"), ("c", "d"), ("d", "a")],
    ));
    let page_rank = &output.summary.centrality.page_rank;
    let total: f64 = page_rank.scores.values().sum();
    assert!((total - 1.0).abs() < 1e-6);
    assert!(page_rank.iterations > 0);
}

#[test]
fn betweenness_on_path() {
    let output = run(call_graph(&["A", "B", "C"], &[("A", "B"), ("B", "C")]));
    let b = &output.summary.centrality.betweenness;
    assert!((b["B"] - 1.0).abs() < 1e-9);
    assert!(b["A"].abs() < 1e-9);
    assert!(b["C"].abs() < 1e-9);
}

#[test]
fn communities_split_on_bridge() {
    let mut edges = Vec::new();
    for group in [["a1", "a2", "a3", "a4"], ["b1", "b2", "b3", "b4"]] {
        for i in 0..4 {
            for j in i + 1..4 {
                edges.push((group[i], group[j]));
            }
        }
    }
    edges.push(("a4", "b1"));
    let ids = ["a1", "a2", "a3", "a4", "b1", "b2", "b3", "b4"];
    let output = run(call_graph(&ids, &edges));

    let communities = &output.summary.communities;
    assert_eq!(communities.count(), 2);
    assert_eq!(communities.communities["a1"], communities.communities["a4"]);
    assert_ne!(communities.communities["a4"], communities.communities["b1"]);
    assert!(communities.modularity > 0.4);
    assert_eq!(
        output.graph.metric("b3", "community"),
        Some(&json!(communities.communities["b3"]))
    );
}

#[test]
fn similarity_layer_feeds_undirected_metrics() {
    let output = run(json!({
        "functions": [
            func("a", "a", "s.py", "python", 1, 5),
            func("b", "b", "s.py", "python", 6, 10),
            func("c", "c", "s.py", "python", 11, 15)
        ],
        "similarityEdges": [
            {"source": "a", "target": "b", "similarity": 0.9},
            {"source": "b", "target": "a", "similarity": 0.7},
            {"source": "b", "target": "c", "similarity": 0.5}
        ]
    }));

    assert_eq!(output.graph.similarity_edge_count(), 2);
    assert_eq!(output.summary.build.similarity_edges.merged, 1);
    assert!((output.summary.centrality.betweenness["b"] - 1.0).abs() < 1e-9);
    assert_eq!(output.graph.call_edge_count(), 0);
}

#[test]
fn resolution_is_deterministic() {
    let payload = json!({
        "functions": [
            func("main", "main", "src/app.ts", "typescript", 1, 10),
            func("h1", "helper", "src/a.ts", "typescript", 1, 5),
            func("h2", "helper", "src/sub/b.ts", "typescript", 1, 5),
            func("h3", "helper", "other/c.ts", "typescript", 1, 5)
        ],
        "calls": [call("src/app.ts", "helper", 2), call("src/app.ts", "helper", 3)]
    });
    let pipeline = Pipeline::default();
    let first = pipeline.load(vec![payload.clone()]).unwrap();
    let second = pipeline.load(vec![payload]).unwrap();

    let (a, _) = pipeline.resolve(&first);
    let (b, _) = pipeline.resolve(&second);
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_value(&a).unwrap(),
        serde_json::to_value(&b).unwrap()
    );
}

#[test]
fn heterogeneous_documents_merge() {
    let dump = json!({
        "graph": {
            "nodes": [func("a", "a", "m.go", "go", 1, 5), func("b", "b", "m.go", "go", 6, 9)],
            "edges": [{"layer": "call", "source": "a", "target": "b", "weight": 2}]
        }
    });
    let canonical = json!([{
        "functions": [func("a", "a", "m.go", "go", 1, 5)],
        "callEdges": [{"source": "a", "target": "b"}]
    }]);

    let output = Pipeline::default()
        .run_documents(vec![dump, canonical])
        .unwrap();
    let graph = &output.graph;
    let edge = graph
        .call_edge(graph.index_of("a").unwrap(), graph.index_of("b").unwrap())
        .unwrap();

    assert_eq!(graph.node_count(), 2);
    assert_eq!(edge.weight, 3.0);
    assert_eq!(output.summary.merge.duplicate_functions, 1);
    assert_eq!(output.summary.merge.merged_call_edges, 1);
    let warnings = &output.summary.validation.issues;
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|w| !w.is_error()));
}

#[test]
fn duplicates_show_up_in_build_stats() {
    let output = run(json!({
        "functions": [
            func("a", "a", "d.py", "python", 1, 5),
            func("a", "a", "d.py", "python", 1, 5),
            func("b", "b", "d.py", "python", 6, 9)
        ],
        "callEdges": [
            {"source": "a", "target": "b"},
            {"source": "a", "target": "b"}
        ]
    }));
    let build = &output.summary.build;

    assert_eq!(build.nodes.added, 2);
    assert_eq!(build.nodes.duplicates, 1);
    assert_eq!((build.call_edges.input, build.call_edges.added, build.call_edges.merged), (2, 1, 1));
    assert_eq!(summary(&output)["build"]["nodes"]["duplicates"], json!(1));
}

#[test]
fn reingested_graph_gets_fresh_metrics() {
    let first = run(call_graph(&["a", "b", "c"], &[("a", "b")]));
    let dump = first.graph.to_json().unwrap();
    assert_eq!(first.graph.metric("b", "callInDegree"), Some(&json!(1)));

    let second = Pipeline::default()
        .run_documents(vec![dump, json!({"callEdges": [{"source": "c", "target": "b"}]})])
        .unwrap();
    let graph = &second.graph;
    let page_rank = second.summary.centrality.page_rank.scores["b"];

    assert_eq!(graph.metric("b", "callInDegree"), Some(&json!(2)));
    assert_eq!(graph.metric("b", "pageRank"), Some(&json!(page_rank)));
}

#[test]
fn lenient_mode_keeps_invalid_functions() {
    let output = run(json!({
        "functions": [func("a", "a", "x.cob", "cobol", 1, 5)]
    }));

    assert_eq!(output.summary.validation.issues.len(), 1);
    assert!(output.summary.validation.issues[0].is_error());
    assert!(output.graph.contains("a"));
}
