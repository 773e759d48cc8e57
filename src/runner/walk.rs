//! Shared collection traversal
//!
//! One traversal routine serves both the runner (which executes each leaf)
//! and the test-count predictor (which statically counts), so the two can
//! never disagree about inheritance or ordering.
//!
//! Scripts stack: entering a folder appends its scripts to the inherited
//! chains, never replaces them. The effective chain for a request is
//! collection, then ancestor folders outermost first, then the request's
//! own script last. Traversal is depth-first, left-to-right.
//!
//! Each chain entry carries the script's level as a [`ScriptKind`] so
//! context errors name the level the script was declared at. Post-chain
//! entries are all post-request: once a response exists, assertions are
//! legal at every level of the chain.

use crate::model::{Collection, CollectionItem, Request, Script};
use crate::script::ScriptKind;

/// One request leaf with its effective script chains
pub struct RequestPlan<'a> {
    pub request: &'a Request,
    pub pre_chain: Vec<(ScriptKind, &'a Script)>,
    pub post_chain: Vec<(ScriptKind, &'a Script)>,
}

/// Visit every request leaf in execution order
pub fn walk<'a, F>(collection: &'a Collection, visit: &mut F)
where
    F: FnMut(RequestPlan<'a>),
{
    let mut pre: Vec<(ScriptKind, &Script)> = collection
        .pre_script
        .iter()
        .map(|s| (ScriptKind::Collection, s))
        .collect();
    let mut post: Vec<(ScriptKind, &Script)> = collection
        .post_script
        .iter()
        .map(|s| (ScriptKind::PostRequest, s))
        .collect();
    walk_items(&collection.items, &mut pre, &mut post, visit);
}

/// Collect all request plans in execution order
pub fn request_plans(collection: &Collection) -> Vec<RequestPlan<'_>> {
    let mut plans = Vec::new();
    walk(collection, &mut |plan| plans.push(plan));
    plans
}

fn walk_items<'a, F>(
    items: &'a [CollectionItem],
    pre: &mut Vec<(ScriptKind, &'a Script)>,
    post: &mut Vec<(ScriptKind, &'a Script)>,
    visit: &mut F,
) where
    F: FnMut(RequestPlan<'a>),
{
    for item in items {
        match item {
            CollectionItem::Folder(folder) => {
                let pre_len = pre.len();
                let post_len = post.len();
                pre.extend(folder.pre_script.iter().map(|s| (ScriptKind::Folder, s)));
                post.extend(
                    folder
                        .post_script
                        .iter()
                        .map(|s| (ScriptKind::PostRequest, s)),
                );

                walk_items(&folder.items, pre, post, visit);

                pre.truncate(pre_len);
                post.truncate(post_len);
            }
            CollectionItem::Request(request) => {
                let mut pre_chain = pre.clone();
                pre_chain.extend(
                    request
                        .pre_script
                        .iter()
                        .map(|s| (ScriptKind::PreRequest, s)),
                );
                let mut post_chain = post.clone();
                post_chain.extend(
                    request
                        .post_script
                        .iter()
                        .map(|s| (ScriptKind::PostRequest, s)),
                );

                visit(RequestPlan {
                    request,
                    pre_chain,
                    post_chain,
                });
            }
        }
    }
}
